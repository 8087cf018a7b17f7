//! Shared fixtures: demo record shapes and engine constructors.

#![allow(dead_code)]

use rusqlite::types::Value;
use rusqlite::Row;

use hindsight_core::record::{
    AccessMask, Containment, Envelope, OwnerId, RecordShape,
};
use hindsight_core::StoreConfig;
use hindsight_storage::StoreEngine;

pub const BALANCE_MASK: AccessMask = AccessMask::new(0b0001);
pub const ASSET_MASK: AccessMask = AccessMask::new(0b0010);
pub const SHEET_MASK: AccessMask = AccessMask::new(0b0100);

/// Per-division wallet balance. Natural key: division.
#[derive(Debug, Clone)]
pub struct WalletBalance {
    pub envelope: Envelope,
    pub division: i64,
    pub balance: i64,
}

impl RecordShape for WalletBalance {
    const TABLE: &'static str = "wallet_balances";
    const MASK: AccessMask = BALANCE_MASK;

    fn payload_ddl() -> &'static [(&'static str, &'static str)] {
        &[
            ("division", "INTEGER NOT NULL"),
            ("balance", "INTEGER NOT NULL"),
        ]
    }

    fn payload_values(&self) -> Vec<Value> {
        vec![Value::Integer(self.division), Value::Integer(self.balance)]
    }

    fn from_row(envelope: Envelope, row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(WalletBalance {
            envelope,
            division: row.get(5)?,
            balance: row.get(6)?,
        })
    }

    fn natural_key(&self) -> Vec<(&'static str, Value)> {
        vec![("division", Value::Integer(self.division))]
    }

    fn equivalent(&self, other: &Self) -> bool {
        self.division == other.division && self.balance == other.balance
    }

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }
}

/// Nested item. Natural key: item_id; container_id points at the
/// parent's item_id. `flags` is a multi-valued (JSON set) column and
/// `display` a derived, unpersisted projection.
#[derive(Debug, Clone)]
pub struct Asset {
    pub envelope: Envelope,
    pub item_id: i64,
    pub container_id: Option<i64>,
    pub type_name: String,
    pub quantity: i64,
    pub flags: Vec<String>,
    pub display: String,
}

impl RecordShape for Asset {
    const TABLE: &'static str = "assets";
    const MASK: AccessMask = ASSET_MASK;
    const CONTAINER: Option<Containment> = Some(Containment {
        id_column: "item_id",
        container_column: "container_id",
    });

    fn payload_ddl() -> &'static [(&'static str, &'static str)] {
        &[
            ("item_id", "INTEGER NOT NULL"),
            ("container_id", "INTEGER"),
            ("type_name", "TEXT NOT NULL"),
            ("quantity", "INTEGER NOT NULL"),
            ("flags", "TEXT NOT NULL"),
        ]
    }

    fn payload_values(&self) -> Vec<Value> {
        let flags_json = serde_json::to_string(&self.flags).expect("serialize flags");
        vec![
            Value::Integer(self.item_id),
            match self.container_id {
                Some(c) => Value::Integer(c),
                None => Value::Null,
            },
            Value::Text(self.type_name.clone()),
            Value::Integer(self.quantity),
            Value::Text(flags_json),
        ]
    }

    fn from_row(envelope: Envelope, row: &Row<'_>) -> rusqlite::Result<Self> {
        let flags_json: String = row.get(9)?;
        let flags: Vec<String> = serde_json::from_str(&flags_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                9,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?;
        Ok(Asset {
            envelope,
            item_id: row.get(5)?,
            container_id: row.get(6)?,
            type_name: row.get(7)?,
            quantity: row.get(8)?,
            flags,
            display: String::new(),
        })
    }

    fn natural_key(&self) -> Vec<(&'static str, Value)> {
        vec![("item_id", Value::Integer(self.item_id))]
    }

    fn equivalent(&self, other: &Self) -> bool {
        self.item_id == other.item_id
            && self.container_id == other.container_id
            && self.type_name == other.type_name
            && self.quantity == other.quantity
            && self.flags == other.flags
    }

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }

    fn refresh_derived(&mut self) {
        self.display = format!("{} x{}", self.type_name, self.quantity);
    }
}

/// Singleton shape: one logical record per owner, empty natural key.
#[derive(Debug, Clone)]
pub struct ProfileSheet {
    pub envelope: Envelope,
    pub name: String,
}

impl RecordShape for ProfileSheet {
    const TABLE: &'static str = "profile_sheets";
    const MASK: AccessMask = SHEET_MASK;

    fn payload_ddl() -> &'static [(&'static str, &'static str)] {
        &[("name", "TEXT NOT NULL")]
    }

    fn payload_values(&self) -> Vec<Value> {
        vec![Value::Text(self.name.clone())]
    }

    fn from_row(envelope: Envelope, row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ProfileSheet {
            envelope,
            name: row.get(5)?,
        })
    }

    fn natural_key(&self) -> Vec<(&'static str, Value)> {
        Vec::new()
    }

    fn equivalent(&self, other: &Self) -> bool {
        self.name == other.name
    }

    fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

static TRACING: std::sync::Once = std::sync::Once::new();

/// Route store logs through the test harness; `RUST_LOG` controls
/// verbosity as usual.
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn engine() -> StoreEngine {
    engine_with(StoreConfig::default())
}

pub fn engine_with(config: StoreConfig) -> StoreEngine {
    init_tracing();
    let engine = StoreEngine::open_in_memory(config).unwrap();
    engine.ensure_shape::<WalletBalance>().unwrap();
    engine.ensure_shape::<Asset>().unwrap();
    engine.ensure_shape::<ProfileSheet>().unwrap();
    engine
}

pub fn owner(id: i64) -> OwnerId {
    OwnerId::new(id).unwrap()
}

pub fn balance(owner_id: i64, start: i64, division: i64, amount: i64) -> WalletBalance {
    WalletBalance {
        envelope: Envelope::begin(owner(owner_id), start, BALANCE_MASK).unwrap(),
        division,
        balance: amount,
    }
}

pub fn asset(
    owner_id: i64,
    start: i64,
    item_id: i64,
    container_id: Option<i64>,
    type_name: &str,
    quantity: i64,
    flags: &[&str],
) -> Asset {
    Asset {
        envelope: Envelope::begin(owner(owner_id), start, ASSET_MASK).unwrap(),
        item_id,
        container_id,
        type_name: type_name.to_string(),
        quantity,
        flags: flags.iter().map(|f| f.to_string()).collect(),
        display: String::new(),
    }
}

pub fn sheet(owner_id: i64, start: i64, name: &str) -> ProfileSheet {
    ProfileSheet {
        envelope: Envelope::begin(owner(owner_id), start, SHEET_MASK).unwrap(),
        name: name.to_string(),
    }
}
