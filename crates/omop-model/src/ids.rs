//! Deterministic record id generation.
//!
//! Ids are derived from semantic key tuples so that re-converting the same
//! document yields the same primary keys, in any process on any machine. Each
//! target table has a reserved namespace prefix hashed as the first part,
//! keeping key tuples from colliding across tables. Hash collisions within a
//! table are accepted as negligible.

use sha2::{Digest, Sha256};

/// Hash an ordered key tuple into a positive `i64`.
///
/// Every part is fed to SHA-256 followed by a `0x00` separator byte (which
/// cannot occur inside a legitimate value), so `["ab", "c"]` and `["a", "bc"]`
/// hash differently. The first 8 digest bytes are read as a big-endian
/// unsigned 64-bit integer, reinterpreted as signed, and returned as an
/// absolute value. Part order is significant: callers must not reorder key
/// components between runs.
pub fn generate_id<I, S>(parts: I) -> i64
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_ref().as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let signed = u64::from_be_bytes(prefix) as i64;
    signed.checked_abs().unwrap_or(i64::MAX)
}

pub fn generate_person_id(patient_id: &str, source_system: &str) -> i64 {
    generate_id(["person", patient_id, source_system])
}

pub fn generate_visit_id(person_id: i64, encounter_id: &str) -> i64 {
    generate_id(["visit", &person_id.to_string(), encounter_id])
}

pub fn generate_condition_id(person_id: i64, condition_code: &str, start_date: &str) -> i64 {
    generate_id(["condition", &person_id.to_string(), condition_code, start_date])
}

pub fn generate_drug_exposure_id(person_id: i64, drug_code: &str, start_date: &str) -> i64 {
    generate_id(["drug", &person_id.to_string(), drug_code, start_date])
}

pub fn generate_procedure_id(person_id: i64, procedure_code: &str, date: &str) -> i64 {
    generate_id(["procedure", &person_id.to_string(), procedure_code, date])
}

pub fn generate_measurement_id(
    person_id: i64,
    measurement_code: &str,
    date: &str,
    value: &str,
) -> i64 {
    generate_id([
        "measurement",
        &person_id.to_string(),
        measurement_code,
        date,
        value,
    ])
}

pub fn generate_observation_id(person_id: i64, observation_code: &str, date: &str) -> i64 {
    generate_id(["observation", &person_id.to_string(), observation_code, date])
}

pub fn generate_device_exposure_id(person_id: i64, device_code: &str, start_date: &str) -> i64 {
    generate_id(["device", &person_id.to_string(), device_code, start_date])
}
