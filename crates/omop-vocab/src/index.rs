//! OMOP vocabulary table loading and concept resolution.
//!
//! The CONCEPT table runs to millions of rows; filtering to the clinically
//! relevant vocabularies at load time bounds memory. Loading is tolerant of
//! dirty rows (short records, unparseable ids, invalidated entries are
//! skipped), while a wrong header fails the load outright.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::ReaderBuilder;
use tracing::{debug, info};

use crate::error::VocabError;
use crate::hash::sha256_hex;

/// Vocabularies retained from the CONCEPT table.
pub const RELEVANT_VOCABULARIES: &[&str] = &[
    "SNOMED",
    "RxNorm",
    "LOINC",
    "ICD10CM",
    "ICD9CM",
    "CPT4",
    "HCPCS",
    "CVX",
    "NDC",
    "UNII",
    "NDFRT",
    "NCI",
    "ActCode",
    "RouteOfAdministration",
    "Gender",
    "Race",
    "Ethnicity",
    "UCUM",
    "Visit",
];

/// One row of the OMOP CONCEPT table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Concept {
    pub concept_id: i64,
    pub concept_name: String,
    pub domain_id: String,
    pub vocabulary_id: String,
    pub concept_class_id: String,
    pub standard_concept: String,
    pub concept_code: String,
}

impl Concept {
    pub fn is_standard(&self) -> bool {
        self.standard_concept == "S"
    }
}

/// How a source code resolved to standard concepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionKind {
    /// The looked-up concept is itself flagged standard.
    Standard,
    /// Resolved through one or more "Maps to" edges.
    MapsTo,
    /// Indexed concept with no mapping; its own id is returned untranslated.
    SourceOnly,
    /// No concept exists for the code.
    Missing,
}

/// Resolution result: the standard concept ids plus how they were obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptResolution {
    pub concept_ids: Vec<i64>,
    pub kind: ResolutionKind,
}

impl ConceptResolution {
    pub fn mapped_to_standard(&self) -> bool {
        matches!(self.kind, ResolutionKind::Standard | ResolutionKind::MapsTo)
    }
}

/// Loaded, indexed vocabulary tables.
///
/// Loaded once per batch and shared read-only afterwards; nothing mutates the
/// index after the load phase.
#[derive(Debug, Default)]
pub struct VocabIndex {
    by_code: HashMap<String, i64>,
    by_id: HashMap<i64, Concept>,
    maps_to: HashMap<i64, Vec<i64>>,
}

impl VocabIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn concept_key(vocabulary_id: &str, code: &str) -> String {
        format!("{vocabulary_id}|{code}")
    }

    fn insert(&mut self, concept: Concept) {
        let key = Self::concept_key(&concept.vocabulary_id, &concept.concept_code);
        self.by_code.insert(key, concept.concept_id);
        self.by_id.insert(concept.concept_id, concept);
    }

    /// Load the CONCEPT table, retaining only [`RELEVANT_VOCABULARIES`].
    ///
    /// Returns the number of concepts loaded.
    pub fn load_concepts(&mut self, path: impl AsRef<Path>) -> Result<usize, VocabError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| VocabError::io(path, e))?;
        let mut reader = tab_reader(BufReader::new(file));

        check_header(&mut reader, path, "concept_id")?;

        let mut count = 0usize;
        for record in reader.records() {
            let record = record.map_err(|e| VocabError::csv(path, e))?;
            if record.len() < 10 {
                continue;
            }
            let vocabulary_id = &record[3];
            if !RELEVANT_VOCABULARIES.contains(&vocabulary_id) {
                continue;
            }
            let Ok(concept_id) = record[0].parse::<i64>() else {
                continue;
            };
            // invalid_reason set means the concept was retired
            if !record[9].is_empty() {
                continue;
            }
            self.insert(Concept {
                concept_id,
                concept_name: record[1].to_string(),
                domain_id: record[2].to_string(),
                vocabulary_id: vocabulary_id.to_string(),
                concept_class_id: record[4].to_string(),
                standard_concept: record[5].to_string(),
                concept_code: record[6].to_string(),
            });
            count += 1;
        }

        info!(count, path = %path.display(), "loaded concepts");
        Ok(count)
    }

    /// Load the CONCEPT_RELATIONSHIP table, keeping only live "Maps to"
    /// edges whose source concept is already indexed.
    ///
    /// Returns the number of edges loaded.
    pub fn load_relationships(&mut self, path: impl AsRef<Path>) -> Result<usize, VocabError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| VocabError::io(path, e))?;
        let mut reader = tab_reader(BufReader::new(file));

        check_header(&mut reader, path, "concept_id_1")?;

        let mut count = 0usize;
        for record in reader.records() {
            let record = record.map_err(|e| VocabError::csv(path, e))?;
            if record.len() < 6 {
                continue;
            }
            if &record[2] != "Maps to" {
                continue;
            }
            if !record[5].is_empty() {
                continue;
            }
            let (Ok(source_id), Ok(target_id)) =
                (record[0].parse::<i64>(), record[1].parse::<i64>())
            else {
                continue;
            };
            if self.by_id.contains_key(&source_id) {
                self.maps_to.entry(source_id).or_default().push(target_id);
                count += 1;
            }
        }

        info!(count, path = %path.display(), "loaded 'Maps to' relationships");
        Ok(count)
    }

    /// Load a supplementary CONCEPT-shaped file.
    ///
    /// Leading `#` comment lines before the header are tolerated, and there is
    /// no vocabulary filter; entries sharing a `(vocabulary_id, concept_code)`
    /// key with an earlier load win.
    pub fn load_supplementary(&mut self, path: impl AsRef<Path>) -> Result<usize, VocabError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| VocabError::io(path, e))?;
        debug!(path = %path.display(), sha256 = %sha256_hex(&bytes), "loading supplementary vocabulary");

        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .quoting(false)
            .comment(Some(b'#'))
            .has_headers(true)
            .from_reader(bytes.as_slice());

        check_header(&mut reader, path, "concept_id")?;

        let mut count = 0usize;
        for record in reader.records() {
            let record = record.map_err(|e| VocabError::csv(path, e))?;
            if record.len() < 7 {
                continue;
            }
            let Ok(concept_id) = record[0].parse::<i64>() else {
                continue;
            };
            if record.len() > 9 && !record[9].is_empty() {
                continue;
            }
            self.insert(Concept {
                concept_id,
                concept_name: record[1].to_string(),
                domain_id: record[2].to_string(),
                vocabulary_id: record[3].to_string(),
                concept_class_id: record[4].to_string(),
                standard_concept: record[5].to_string(),
                concept_code: record[6].to_string(),
            });
            count += 1;
        }

        info!(count, path = %path.display(), "loaded supplementary concepts");
        Ok(count)
    }

    /// Concept by vocabulary id and code.
    pub fn lookup(&self, vocabulary_id: &str, code: &str) -> Option<&Concept> {
        let id = self.by_code.get(&Self::concept_key(vocabulary_id, code))?;
        self.by_id.get(id)
    }

    /// Concept by its id.
    pub fn lookup_by_id(&self, concept_id: i64) -> Option<&Concept> {
        self.by_id.get(&concept_id)
    }

    /// All standard concept ids for a source code.
    ///
    /// A concept flagged standard resolves to itself; otherwise its "Maps to"
    /// targets are returned in load order. An indexed concept with no mapping
    /// falls back to its own id, so an indexed code never resolves empty. Only
    /// a code absent from the index yields an empty list.
    pub fn standard_concept_ids(&self, vocabulary_id: &str, code: &str) -> Vec<i64> {
        self.resolution(vocabulary_id, code).concept_ids
    }

    /// First standard concept id, or 0 when the code is unknown.
    pub fn standard_concept_id(&self, vocabulary_id: &str, code: &str) -> i64 {
        self.standard_concept_ids(vocabulary_id, code)
            .first()
            .copied()
            .unwrap_or(0)
    }

    /// Like [`Self::standard_concept_ids`] but also reports how the ids were
    /// obtained, letting callers distinguish an unmapped source fallback from
    /// a genuine standard resolution.
    pub fn resolution(&self, vocabulary_id: &str, code: &str) -> ConceptResolution {
        let Some(concept) = self.lookup(vocabulary_id, code) else {
            return ConceptResolution {
                concept_ids: Vec::new(),
                kind: ResolutionKind::Missing,
            };
        };

        if concept.is_standard() {
            return ConceptResolution {
                concept_ids: vec![concept.concept_id],
                kind: ResolutionKind::Standard,
            };
        }

        if let Some(targets) = self.maps_to.get(&concept.concept_id)
            && !targets.is_empty()
        {
            return ConceptResolution {
                concept_ids: targets.clone(),
                kind: ResolutionKind::MapsTo,
            };
        }

        ConceptResolution {
            concept_ids: vec![concept.concept_id],
            kind: ResolutionKind::SourceOnly,
        }
    }

    /// The domain of a concept, empty if unknown.
    pub fn domain_of(&self, concept_id: i64) -> &str {
        self.by_id
            .get(&concept_id)
            .map(|c| c.domain_id.as_str())
            .unwrap_or("")
    }

    pub fn concept_count(&self) -> usize {
        self.by_id.len()
    }
}

fn tab_reader<R: Read>(reader: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .quoting(false)
        .has_headers(true)
        .from_reader(reader)
}

fn check_header<R: Read>(
    reader: &mut csv::Reader<R>,
    path: &Path,
    expected: &'static str,
) -> Result<(), VocabError> {
    let headers = reader.headers().map_err(|e| VocabError::csv(path, e))?;
    let first = headers.get(0).unwrap_or("").trim_matches('\u{feff}');
    if !first.starts_with(expected) {
        return Err(VocabError::BadHeader {
            path: path.to_path_buf(),
            expected,
            found: first.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("omop-vocab-{}-{name}", std::process::id()));
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    const CONCEPT_HEADER: &str = "concept_id\tconcept_name\tdomain_id\tvocabulary_id\tconcept_class_id\tstandard_concept\tconcept_code\tvalid_start_date\tvalid_end_date\tinvalid_reason\n";

    fn concept_row(
        id: i64,
        name: &str,
        domain: &str,
        vocab: &str,
        standard: &str,
        code: &str,
        invalid: &str,
    ) -> String {
        format!(
            "{id}\t{name}\t{domain}\t{vocab}\tClinical Finding\t{standard}\t{code}\t20000101\t20991231\t{invalid}\n"
        )
    }

    #[test]
    fn load_and_lookup_standard_concept() {
        let contents = format!(
            "{CONCEPT_HEADER}{}",
            concept_row(
                44054006,
                "Type 2 diabetes mellitus",
                "Condition",
                "SNOMED",
                "S",
                "44054006",
                ""
            )
        );
        let path = write_temp("concepts.csv", &contents);
        let mut index = VocabIndex::new();
        assert_eq!(index.load_concepts(&path).unwrap(), 1);

        let concept = index.lookup("SNOMED", "44054006").unwrap();
        assert_eq!(concept.concept_name, "Type 2 diabetes mellitus");
        assert_eq!(concept.domain_id, "Condition");
        assert_eq!(index.standard_concept_ids("SNOMED", "44054006"), vec![44054006]);
        assert_eq!(index.domain_of(44054006), "Condition");
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn irrelevant_vocabulary_and_invalid_rows_skipped() {
        let contents = format!(
            "{CONCEPT_HEADER}{}{}{}{}",
            concept_row(1, "kept", "Condition", "SNOMED", "S", "C1", ""),
            concept_row(2, "wrong vocab", "Condition", "MedDRA", "S", "C2", ""),
            concept_row(3, "retired", "Condition", "SNOMED", "S", "C3", "D"),
            "notanumber\tbad id\tCondition\tSNOMED\tClinical Finding\tS\tC4\t20000101\t20991231\t\n",
        );
        let path = write_temp("concepts-filter.csv", &contents);
        let mut index = VocabIndex::new();
        assert_eq!(index.load_concepts(&path).unwrap(), 1);
        assert!(index.lookup("MedDRA", "C2").is_none());
        assert!(index.lookup("SNOMED", "C3").is_none());
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn bad_concept_header_fails() {
        let path = write_temp("concepts-bad.csv", "wrong\theader\n1\t2\n");
        let mut index = VocabIndex::new();
        assert!(matches!(
            index.load_concepts(&path),
            Err(VocabError::BadHeader { .. })
        ));
        std::fs::remove_file(path).ok();
    }

    const REL_HEADER: &str = "concept_id_1\tconcept_id_2\trelationship_id\tvalid_start_date\tvalid_end_date\tinvalid_reason\n";

    #[test]
    fn maps_to_fan_out_preserves_order() {
        let concepts = format!(
            "{CONCEPT_HEADER}{}{}{}",
            concept_row(100, "source", "Condition", "ICD10CM", "", "E11.9", ""),
            concept_row(200, "target a", "Condition", "SNOMED", "S", "A", ""),
            concept_row(300, "target b", "Condition", "SNOMED", "S", "B", ""),
        );
        let relationships = format!(
            "{REL_HEADER}\
             100\t300\tMaps to\t20000101\t20991231\t\n\
             100\t200\tMaps to\t20000101\t20991231\t\n\
             100\t400\tIs a\t20000101\t20991231\t\n\
             100\t500\tMaps to\t20000101\t20991231\tD\n\
             999\t200\tMaps to\t20000101\t20991231\t\n"
        );
        let cpath = write_temp("rel-concepts.csv", &concepts);
        let rpath = write_temp("rel-edges.csv", &relationships);
        let mut index = VocabIndex::new();
        index.load_concepts(&cpath).unwrap();
        // "Is a", invalidated, and unindexed-source rows are all dropped
        assert_eq!(index.load_relationships(&rpath).unwrap(), 2);
        assert_eq!(index.standard_concept_ids("ICD10CM", "E11.9"), vec![300, 200]);
        assert_eq!(
            index.resolution("ICD10CM", "E11.9").kind,
            ResolutionKind::MapsTo
        );
        std::fs::remove_file(cpath).ok();
        std::fs::remove_file(rpath).ok();
    }

    #[test]
    fn orphan_concept_falls_back_to_self() {
        let contents = format!(
            "{CONCEPT_HEADER}{}",
            concept_row(700, "orphan", "Drug", "RxNorm", "", "123", "")
        );
        let path = write_temp("orphan.csv", &contents);
        let mut index = VocabIndex::new();
        index.load_concepts(&path).unwrap();
        assert_eq!(index.standard_concept_ids("RxNorm", "123"), vec![700]);
        assert_eq!(
            index.resolution("RxNorm", "123").kind,
            ResolutionKind::SourceOnly
        );
        // Unknown code resolves empty, not to a fallback
        assert!(index.standard_concept_ids("RxNorm", "999").is_empty());
        assert_eq!(
            index.resolution("RxNorm", "999").kind,
            ResolutionKind::Missing
        );
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn supplementary_tolerates_comments_and_overwrites() {
        let base = format!(
            "{CONCEPT_HEADER}{}",
            concept_row(10, "old name", "Condition", "SNOMED", "S", "X1", "")
        );
        let supplementary = format!(
            "# comment line\n# another\n{CONCEPT_HEADER}\
             11\tnew name\tCondition\tSNOMED\tClinical Finding\tS\tX1\t20000101\t20991231\t\n\
             12\tlocal code\tMeasurement\tLocalLab\tLab Test\tS\tL1\t20000101\t20991231\t\n"
        );
        let bpath = write_temp("supp-base.csv", &base);
        let spath = write_temp("supp-extra.csv", &supplementary);
        let mut index = VocabIndex::new();
        index.load_concepts(&bpath).unwrap();
        assert_eq!(index.load_supplementary(&spath).unwrap(), 2);

        // last-load-wins on the (vocabulary, code) key
        assert_eq!(index.lookup("SNOMED", "X1").unwrap().concept_id, 11);
        // no vocabulary allow-list for supplementary files
        assert_eq!(index.lookup("LocalLab", "L1").unwrap().concept_id, 12);
        std::fs::remove_file(bpath).ok();
        std::fs::remove_file(spath).ok();
    }
}
