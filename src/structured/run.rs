//! Run-scoped pseudonym state.

use chrono::{Local, NaiveDate};
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

/// Number of hex chars kept from a salted hash.
pub const HASH_LEN: usize = 12;

/// Counters, pseudonym tables and hash salt of one anonymization run.
///
/// Created by the caller for a batch or a single document and dropped with
/// it; two runs never share pseudonyms.
#[derive(Debug, Clone)]
pub struct RunState {
    /// Auxiliary account labels (CompAuxLib)
    clients: HashMap<String, String>,
    /// General account labels (CompteLib), numbered separately
    account_labels: HashMap<String, String>,
    references: HashMap<String, String>,
    employees: HashMap<String, String>,
    current_employee: Option<String>,
    digests: HashSet<String>,
    salt: Vec<u8>,
    reference_date: NaiveDate,
}

impl RunState {
    /// Fresh state with a random salt and today's date as reference.
    pub fn new() -> Self {
        let mut rng = rand::rngs::StdRng::from_entropy();
        let salt: [u8; 16] = rng.gen();
        Self::with_salt(salt.to_vec())
    }

    /// Fresh state with a fixed salt, for reproducible output.
    pub fn with_salt(salt: impl Into<Vec<u8>>) -> Self {
        Self {
            clients: HashMap::new(),
            account_labels: HashMap::new(),
            references: HashMap::new(),
            employees: HashMap::new(),
            current_employee: None,
            digests: HashSet::new(),
            salt: salt.into(),
            reference_date: Local::now().date_naive(),
        }
    }

    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = date;
        self
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }

    /// `Client###` pseudonym of an auxiliary account label, stable per label
    /// within the run.
    pub fn client_pseudonym(&mut self, label: &str) -> String {
        counter_pseudonym(&mut self.clients, label)
    }

    /// `Client###` pseudonym of a general account label. Counted apart from
    /// auxiliary labels.
    pub fn account_label_pseudonym(&mut self, label: &str) -> String {
        counter_pseudonym(&mut self.account_labels, label)
    }

    /// `REF-#####` pseudonym, stable per original reference within the run.
    pub fn reference_pseudonym(&mut self, reference: &str) -> String {
        let next = self.references.len() + 1;
        self.references
            .entry(reference.to_string())
            .or_insert_with(|| format!("REF-{:05}", next))
            .clone()
    }

    /// Opens (or reopens) the employee identified by `key` and makes it
    /// current. Returns its `SALARIE###` id.
    pub fn open_employee(&mut self, key: &str) -> String {
        let next = self.employees.len() + 1;
        let id = self
            .employees
            .entry(key.to_string())
            .or_insert_with(|| format!("SALARIE{:03}", next))
            .clone();
        self.current_employee = Some(id.clone());
        id
    }

    /// Id of the current employee. Fields met before any employee block get
    /// an anonymous employee of their own.
    pub fn current_employee(&mut self) -> String {
        match &self.current_employee {
            Some(id) => id.clone(),
            None => {
                let key = format!("\u{0}anonymous-{}", self.employees.len());
                self.open_employee(&key)
            }
        }
    }

    /// Forgets the current employee; pseudonym tables are kept.
    pub fn end_document(&mut self) {
        self.current_employee = None;
    }

    /// First [`HASH_LEN`] lowercase hex chars of SHA-256(salt ‖ value).
    pub fn hash(&self, value: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.salt);
        hasher.update(value.as_bytes());
        let result = hasher.finalize();
        let mut hex = format!("{result:x}");
        hex.truncate(HASH_LEN);
        hex
    }

    /// Same as [`hash`](Self::hash), remembering the digest so that a second
    /// pass over the output recognizes it.
    pub fn record_hash(&mut self, value: &str) -> String {
        let digest = self.hash(value);
        self.digests.insert(digest.clone());
        digest
    }

    /// True for digests produced by this run.
    pub fn is_own_digest(&self, value: &str) -> bool {
        self.digests.contains(value)
    }

    pub fn employee_count(&self) -> usize {
        self.employees.len()
    }
}

fn counter_pseudonym(table: &mut HashMap<String, String>, label: &str) -> String {
    let next = table.len() + 1;
    table
        .entry(label.to_string())
        .or_insert_with(|| format!("Client{:03}", next))
        .clone()
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}
