//! In-page scripts
//!
//! Every structured-storage operation runs as one self-contained expression
//! evaluated in the page. Scripts resolve to a typed envelope,
//! `{ok: true, value}` on success or `{ok: false, error}` on failure, so
//! diagnostics ride the evaluation result instead of page globals.
//! Connections opened by a script persist between evaluations in a
//! page-global registry (`window.__carryonConns`) keyed by engine-issued
//! connection ids, and install a `versionchange` handler that closes and
//! deregisters them as soon as another open wants the database.

use serde::Deserialize;
use serde_json::Value;

use crate::snapshot::StorageItem;
use crate::storage::bridge::{ConnId, OpenOutcome, StorageError, StoreInfo};
use crate::storage::dump::StoreDump;

const LIST_DATABASES: &str = r#"
(async () => {
  try {
    if (!window.indexedDB || typeof indexedDB.databases !== "function") {
      return { ok: true, value: [] };
    }
    const dbs = await indexedDB.databases();
    const value = dbs
      .filter((db) => typeof db.name === "string")
      .map((db) => ({
        name: db.name,
        version: typeof db.version === "number" ? db.version : null,
      }));
    return { ok: true, value };
  } catch (err) {
    return { ok: false, error: String(err) };
  }
})()
"#;

const OPEN_DATABASE: &str = r#"
(async () => {
  const reg = (window.__carryonConns = window.__carryonConns || {});
  const id = __CONN__;
  const create = __CREATE__;
  try {
    const value = await new Promise((resolve, reject) => {
      let settled = false;
      const req = indexedDB.open(__NAME__, __VERSION__);
      req.onerror = () => {
        if (!settled) {
          settled = true;
          reject(req.error || new Error("open failed"));
        }
      };
      req.onblocked = () => {
        if (!settled) {
          settled = true;
          resolve({ blocked: true });
        }
      };
      req.onupgradeneeded = () => {
        const db = req.result;
        for (const name of create) {
          if (!db.objectStoreNames.contains(name)) {
            db.createObjectStore(name, { autoIncrement: true });
          }
        }
      };
      req.onsuccess = () => {
        const db = req.result;
        if (settled) {
          try { db.close(); } catch (err) {}
          return;
        }
        settled = true;
        db.onversionchange = () => {
          try { db.close(); } catch (err) {}
          delete reg[id];
        };
        reg[id] = db;
        const names = Array.from(db.objectStoreNames);
        let stores = [];
        if (names.length > 0) {
          const tx = db.transaction(names, "readonly");
          stores = names.map((name) => {
            const keyPath = tx.objectStore(name).keyPath;
            return { name, keyPath: keyPath === null ? null : String(keyPath) };
          });
          try { tx.abort(); } catch (err) {}
        }
        resolve({ version: db.version, stores });
      };
    });
    return { ok: true, value };
  } catch (err) {
    return { ok: false, error: String(err) };
  }
})()
"#;

const READ_STORE: &str = r#"
(async () => {
  const reg = window.__carryonConns || {};
  const db = reg[__CONN__];
  if (!db) {
    return { ok: false, error: "unknown connection __CONN__" };
  }
  const encodeValue = (value) => {
    try {
      const text = JSON.stringify(value);
      if (text !== undefined) {
        return { kind: "json", data: JSON.parse(text) };
      }
    } catch (err) {}
    return { kind: "text", data: String(value) };
  };
  try {
    const value = await new Promise((resolve, reject) => {
      const tx = db.transaction(__STORE__, "readonly");
      const store = tx.objectStore(__STORE__);
      const keysReq = store.getAllKeys();
      const valuesReq = store.getAll();
      tx.onerror = () => reject(tx.error || new Error("read transaction failed"));
      tx.onabort = () => reject(tx.error || new Error("read transaction aborted"));
      tx.oncomplete = () => {
        const out = {};
        const keys = keysReq.result;
        const values = valuesReq.result;
        for (let i = 0; i < keys.length; i++) {
          out[String(keys[i])] = encodeValue(values[i]);
        }
        resolve(out);
      };
    });
    return { ok: true, value };
  } catch (err) {
    return { ok: false, error: String(err) };
  }
})()
"#;

const WRITE_STORE: &str = r#"
(async () => {
  const reg = window.__carryonConns || {};
  const db = reg[__CONN__];
  if (!db) {
    return { ok: false, error: "unknown connection __CONN__" };
  }
  const entries = __ENTRIES__;
  try {
    const value = await new Promise((resolve, reject) => {
      let settled = false;
      const errors = [];
      let applied = 0;
      const tx = db.transaction(__STORE__, "readwrite");
      const store = tx.objectStore(__STORE__);
      const explicitKey = store.keyPath === null;
      tx.oncomplete = () => {
        if (!settled) {
          settled = true;
          resolve({ applied, errors });
        }
      };
      tx.onabort = () => {
        if (!settled) {
          settled = true;
          reject(tx.error || new Error("write transaction aborted"));
        }
      };
      for (const entry of entries) {
        const key = entry[0];
        let req;
        try {
          req = explicitKey ? store.put(entry[1], key) : store.put(entry[1]);
        } catch (err) {
          errors.push({ key, message: String(err) });
          continue;
        }
        req.onsuccess = () => { applied += 1; };
        req.onerror = (event) => {
          errors.push({ key, message: String(req.error) });
          event.preventDefault();
        };
      }
    });
    return { ok: true, value };
  } catch (err) {
    return { ok: false, error: String(err) };
  }
})()
"#;

const CLOSE_CONNECTION: &str = r#"
(() => {
  const reg = window.__carryonConns || {};
  const db = reg[__CONN__];
  if (db) {
    try { db.close(); } catch (err) {}
    delete reg[__CONN__];
  }
  return { ok: true, value: null };
})()
"#;

const READ_LOCAL_STORAGE: &str = r#"
(() => {
  try {
    const items = [];
    for (let i = 0; i < localStorage.length; i++) {
      const name = localStorage.key(i);
      items.push({ name, value: localStorage.getItem(name) });
    }
    return { ok: true, value: { origin: window.location.origin, localStorage: items } };
  } catch (err) {
    return { ok: false, error: String(err) };
  }
})()
"#;

const WRITE_LOCAL_STORAGE: &str = r#"
(() => {
  try {
    const items = __ITEMS__;
    for (const item of items) {
      localStorage.setItem(item.name, item.value);
    }
    return { ok: true, value: items.length };
  } catch (err) {
    return { ok: false, error: String(err) };
  }
})()
"#;

/// Encode a Rust string as a JS string literal.
fn js_string(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

pub(crate) fn list_databases() -> &'static str {
    LIST_DATABASES
}

pub(crate) fn open_database(conn: ConnId, name: &str, version: Option<u64>) -> String {
    let version = match version {
        Some(v) => v.to_string(),
        // An explicit undefined makes the open version-less.
        None => "undefined".to_string(),
    };
    OPEN_DATABASE
        .replace("__CONN__", &conn.0.to_string())
        .replace("__NAME__", &js_string(name))
        .replace("__VERSION__", &version)
        .replace("__CREATE__", "[]")
}

pub(crate) fn upgrade_database(
    conn: ConnId,
    name: &str,
    version: u64,
    missing_stores: &[String],
) -> String {
    let create = Value::Array(
        missing_stores
            .iter()
            .map(|s| Value::String(s.clone()))
            .collect(),
    );
    OPEN_DATABASE
        .replace("__CONN__", &conn.0.to_string())
        .replace("__NAME__", &js_string(name))
        .replace("__VERSION__", &version.to_string())
        .replace("__CREATE__", &create.to_string())
}

pub(crate) fn read_store(conn: ConnId, store: &str) -> String {
    READ_STORE
        .replace("__CONN__", &conn.0.to_string())
        .replace("__STORE__", &js_string(store))
}

pub(crate) fn write_store(conn: ConnId, store: &str, entries: &StoreDump) -> String {
    let entries = Value::Array(
        entries
            .iter()
            .map(|(key, value)| {
                Value::Array(vec![Value::String(key.clone()), value.to_plain()])
            })
            .collect(),
    );
    WRITE_STORE
        .replace("__CONN__", &conn.0.to_string())
        .replace("__STORE__", &js_string(store))
        .replace("__ENTRIES__", &entries.to_string())
}

pub(crate) fn close_connection(conn: ConnId) -> String {
    CLOSE_CONNECTION.replace("__CONN__", &conn.0.to_string())
}

pub(crate) fn read_local_storage() -> &'static str {
    READ_LOCAL_STORAGE
}

pub(crate) fn write_local_storage(items: &[StorageItem]) -> String {
    let items = Value::Array(
        items
            .iter()
            .map(|item| {
                serde_json::json!({ "name": item.name, "value": item.value })
            })
            .collect(),
    );
    WRITE_LOCAL_STORAGE.replace("__ITEMS__", &items.to_string())
}

#[derive(Debug, Deserialize)]
struct PageReply {
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

/// Unwrap a script's result envelope into its value.
pub(crate) fn unwrap_reply(raw: Value) -> Result<Value, StorageError> {
    let reply: PageReply = serde_json::from_value(raw)
        .map_err(|err| StorageError::Protocol(format!("malformed reply envelope: {err}")))?;
    if reply.ok {
        Ok(reply.value)
    } else {
        Err(StorageError::Op(
            reply.error.unwrap_or_else(|| "unknown page error".to_string()),
        ))
    }
}

/// Parse the value produced by an open or upgrade script.
pub(crate) fn parse_open_outcome(value: Value) -> Result<OpenOutcome, StorageError> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OpenReply {
        Blocked {
            #[allow(dead_code)]
            blocked: bool,
        },
        Opened {
            version: u64,
            stores: Vec<StoreInfo>,
        },
    }

    match serde_json::from_value(value) {
        Ok(OpenReply::Blocked { .. }) => Ok(OpenOutcome::Blocked),
        Ok(OpenReply::Opened { version, stores }) => Ok(OpenOutcome::Opened { version, stores }),
        Err(err) => Err(StorageError::Protocol(format!(
            "malformed open reply: {err}"
        ))),
    }
}
