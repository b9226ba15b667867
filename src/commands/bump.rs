//! Counter increment used to exercise cross-process exclusion.

use crate::cli::BumpArgs;
use partlock::context::DataDir;
use partlock::error::{PartlockError, Result};
use partlock::store::DocumentStore;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

type Counters = BTreeMap<String, Value>;

pub fn cmd_bump(data: &DataDir, args: BumpArgs) -> Result<()> {
    if args.file.is_empty() || args.file.contains(['/', '\\']) || args.file == ".." {
        return Err(PartlockError::InvalidInput(format!(
            "'{}' must be a file name inside the data directory",
            args.file
        )));
    }

    let store: DocumentStore<Counters> =
        DocumentStore::open(data.root.join(&args.file), data.config.store_options())?;

    let mut value = 0;
    for _ in 0..args.times {
        value = store.update(|doc| {
            let current = doc.get(&args.field).and_then(Value::as_i64).unwrap_or(0);
            let next = increment(current, &args.field)?;
            doc.insert(args.field.clone(), Value::from(next));
            Ok(next)
        })?;
        debug!(file = %args.file, field = %args.field, value, "bumped");
    }

    println!("{}", value);
    Ok(())
}

fn increment(current: i64, field: &str) -> Result<i64> {
    current.checked_add(1).ok_or_else(|| {
        PartlockError::InvalidInput(format!("counter '{}' is at its maximum value", field))
    })
}
