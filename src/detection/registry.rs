use std::fs;
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};

/// Ordered class names; a detection's `class_id` indexes into it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassRegistry {
    names: Vec<String>,
}

impl ClassRegistry {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// One name per line. Every line is kept (trimmed) so ids line up with
    /// line numbers even when the file has blank entries.
    pub fn parse(text: &str) -> Self {
        Self::new(text.lines().map(str::trim))
    }

    /// Load a newline-delimited names file such as `coco.names`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| PipelineError::InvalidNames {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let registry = Self::parse(&text);
        if registry.is_empty() {
            return Err(PipelineError::InvalidNames {
                path: path.to_path_buf(),
                reason: "file contains no class names".to_string(),
            });
        }
        log::debug!("loaded {} class names from {}", registry.len(), path.display());
        Ok(registry)
    }

    /// `None` for an out-of-range id.
    pub fn name(&self, class_id: usize) -> Option<&str> {
        self.names.get(class_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn lookup_in_and_out_of_range() {
        let reg = ClassRegistry::new(["car", "bus"]);
        assert_eq!(reg.name(0), Some("car"));
        assert_eq!(reg.name(1), Some("bus"));
        assert_eq!(reg.name(2), None);
        assert_eq!(reg.name(usize::MAX), None);
    }

    #[test]
    fn parse_keeps_blank_lines_for_index_alignment() {
        let reg = ClassRegistry::parse("person\r\nbicycle\n\ncar\n");
        assert_eq!(reg.len(), 4);
        assert_eq!(reg.name(2), Some(""));
        assert_eq!(reg.name(3), Some("car"));
    }

    #[test]
    fn loads_names_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "person\nbicycle\ncar\nmotorbike").unwrap();
        let reg = ClassRegistry::from_file(file.path()).unwrap();
        assert_eq!(reg.len(), 4);
        assert_eq!(reg.name(3), Some("motorbike"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ClassRegistry::from_file("/nonexistent/coco.names").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidNames { .. }));
        assert!(err.to_string().contains("/nonexistent/coco.names"));
    }

    #[test]
    fn empty_file_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(ClassRegistry::from_file(file.path()).is_err());
    }
}
