use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

/// Background material the persona answers from. Loaded once, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileContext {
    pub summary: String,
    pub profile: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileLoad {
    pub context: ProfileContext,
    /// Set when loading failed and the context fell back to empty text.
    pub warning: Option<String>,
}

#[derive(Debug)]
pub enum ProfileError {
    Missing(PathBuf),
    Read { path: PathBuf, source: std::io::Error },
    Pdf { path: PathBuf, message: String },
}

impl Display for ProfileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(path) => write!(f, "file not found: {}", path.display()),
            Self::Read { path, source } => {
                write!(f, "unable to read {}: {source}", path.display())
            }
            Self::Pdf { path, message } => {
                write!(f, "unable to extract text from {}: {message}", path.display())
            }
        }
    }
}

impl Error for ProfileError {}

impl ProfileContext {
    /// Reads both sources. Any failure degrades to an empty context; startup
    /// never fails because of missing profile material.
    pub fn load(profile_path: &Path, summary_path: &Path) -> ProfileLoad {
        match Self::try_load(profile_path, summary_path) {
            Ok(context) => ProfileLoad {
                context,
                warning: None,
            },
            Err(err) => ProfileLoad {
                context: Self::default(),
                warning: Some(format!(
                    "Profile context unavailable, answering without background: {err}"
                )),
            },
        }
    }

    fn try_load(profile_path: &Path, summary_path: &Path) -> Result<Self, ProfileError> {
        let profile = extract_pdf_text(profile_path)?;
        let summary = read_text(summary_path)?;
        Ok(Self { summary, profile })
    }

    pub fn is_empty(&self) -> bool {
        self.summary.is_empty() && self.profile.is_empty()
    }
}

fn read_text(path: &Path) -> Result<String, ProfileError> {
    fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ProfileError::Missing(path.to_path_buf())
        } else {
            ProfileError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

fn extract_pdf_text(path: &Path) -> Result<String, ProfileError> {
    if !path.exists() {
        return Err(ProfileError::Missing(path.to_path_buf()));
    }

    let document = lopdf::Document::load(path).map_err(|err| ProfileError::Pdf {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;

    let mut text = String::new();
    for page_number in document.get_pages().keys() {
        // Pages without a text layer are skipped like empty ones.
        let Ok(page_text) = document.extract_text(&[*page_number]) else {
            continue;
        };
        if !page_text.is_empty() {
            text.push_str(&page_text);
        }
    }

    Ok(text)
}
