use include_dir::{include_dir, Dir};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

static DATA_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/data");

/// Name of the bank shipped inside the binary
pub const DEFAULT_BANK: &str = "biology";

/// Topic used for questions that do not name one
pub const DEFAULT_TOPIC: &str = "Other";

#[derive(Debug, Error)]
pub enum BankError {
    #[error("bundled question bank `{0}` not found")]
    MissingBundled(String),
    #[error("question bank is not valid utf-8")]
    Encoding,
    #[error("question bank contains no tests")]
    Empty,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
    pub answer: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl Question {
    /// Topic this question is tallied under; blank or missing topics become "Other"
    pub fn topic(&self) -> &str {
        match self.topic.as_deref() {
            Some(t) if !t.trim().is_empty() => t,
            _ => DEFAULT_TOPIC,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Test {
    pub id: u32,
    pub title: String,
    pub duration_minutes: u32,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl Test {
    pub fn duration_secs(&self) -> i64 {
        i64::from(self.duration_minutes) * 60
    }
}

#[derive(Debug, Deserialize)]
struct BankDocument {
    tests: Vec<Test>,
}

/// Where to read the question bank from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BankSource {
    Bundled(String),
    File(PathBuf),
}

impl Default for BankSource {
    fn default() -> Self {
        Self::Bundled(DEFAULT_BANK.to_string())
    }
}

/// Ordered list of tests. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionBank {
    tests: Vec<Test>,
}

impl QuestionBank {
    pub fn parse(json: &str) -> Result<Self, BankError> {
        let doc: BankDocument = serde_json::from_str(json)?;
        if doc.tests.is_empty() {
            return Err(BankError::Empty);
        }
        Ok(Self { tests: doc.tests })
    }

    pub fn try_load(source: &BankSource) -> Result<Self, BankError> {
        match source {
            BankSource::Bundled(name) => {
                let file = DATA_DIR
                    .get_file(format!("{name}.json"))
                    .ok_or_else(|| BankError::MissingBundled(name.clone()))?;
                let json = file.contents_utf8().ok_or(BankError::Encoding)?;
                Self::parse(json)
            }
            BankSource::File(path) => Self::parse(&fs::read_to_string(path)?),
        }
    }

    /// Loads the bank, substituting the built-in fallback list on any failure.
    pub fn load(source: &BankSource) -> Self {
        match Self::try_load(source) {
            Ok(bank) => {
                log::debug!("loaded {} tests from {:?}", bank.tests.len(), source);
                bank
            }
            Err(e) => {
                log::warn!("failed to load question bank {:?}: {}; using fallback", source, e);
                Self::fallback()
            }
        }
    }

    pub fn fallback() -> Self {
        Self {
            tests: vec![Test {
                id: 1,
                title: "Fallback Test".to_string(),
                duration_minutes: 40,
                questions: vec![],
            }],
        }
    }

    pub fn tests(&self) -> &[Test] {
        &self.tests
    }

    /// Test matching `selector`, or the first test when there is no match.
    pub fn select(&self, selector: Option<u32>) -> &Test {
        selector
            .and_then(|id| self.tests.iter().find(|t| t.id == id))
            .unwrap_or(&self.tests[0])
    }

    pub fn position(&self, id: u32) -> Option<usize> {
        self.tests.iter().position(|t| t.id == id)
    }
}
