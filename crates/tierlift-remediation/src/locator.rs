//! Finds the column of blob references in a spreadsheet.
//!
//! Source spreadsheets have no fixed schema, so the locator asks an ordered
//! list of matchers and takes the first answer. The default order is header
//! name first, then content frequency over the first data rows.

use tierlift_core::ObjectReference;

use crate::table::SpreadsheetTable;

/// Header names accepted as the reference column (compared case-insensitively).
pub const DEFAULT_REFERENCE_HEADERS: &[&str] = &[
    "url",
    "uri",
    "link",
    "blob_url",
    "blob_uri",
    "blob_link",
    "blob_location",
    "blob_path",
    "azure_blob_url",
    "azure_blob_location",
    "file_url",
    "file_path",
    "file_location",
    "storage_url",
];

/// Data rows sampled by the content matcher.
pub const DEFAULT_SAMPLE_ROWS: usize = 10;

/// A located column with the matcher's confidence in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnMatch {
    /// Zero-based column index.
    pub index: usize,
    /// 1.0 for a header match; the share of sampled rows holding a reference otherwise.
    pub confidence: f64,
}

/// One strategy for locating the reference column.
pub trait ColumnMatcher: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Returns the reference column, or `None` if this strategy cannot tell.
    fn locate(&self, table: &SpreadsheetTable) -> Option<ColumnMatch>;
}

/// Matches header cells against a fixed vocabulary. Leftmost match wins.
#[derive(Debug, Clone)]
pub struct HeaderNameMatcher {
    names: Vec<String>,
}

impl Default for HeaderNameMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_REFERENCE_HEADERS.iter().copied())
    }
}

impl HeaderNameMatcher {
    /// Creates a matcher for the given header names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|name| name.as_ref().trim().to_lowercase())
                .filter(|name| !name.is_empty())
                .collect(),
        }
    }

    /// Adds names on top of the current vocabulary.
    #[must_use]
    pub fn with_extra_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.names.extend(Self::new(names).names);
        self
    }

    fn accepts(&self, header: &str) -> bool {
        let header = header.trim().to_lowercase();
        self.names.iter().any(|name| *name == header)
    }
}

impl ColumnMatcher for HeaderNameMatcher {
    fn name(&self) -> &'static str {
        "header_name"
    }

    fn locate(&self, table: &SpreadsheetTable) -> Option<ColumnMatch> {
        let index = table.header()?.iter().position(|cell| self.accepts(cell))?;
        Some(ColumnMatch {
            index,
            confidence: 1.0,
        })
    }
}

/// Picks the column with the most references in the first data rows.
///
/// The maximum must be non-zero. Ties go to the leftmost column.
#[derive(Debug, Clone, Copy)]
pub struct ContentFrequencyMatcher {
    sample_rows: usize,
}

impl Default for ContentFrequencyMatcher {
    fn default() -> Self {
        Self {
            sample_rows: DEFAULT_SAMPLE_ROWS,
        }
    }
}

impl ContentFrequencyMatcher {
    /// Creates a matcher sampling at most `sample_rows` data rows.
    #[must_use]
    pub const fn new(sample_rows: usize) -> Self {
        Self { sample_rows }
    }
}

impl ColumnMatcher for ContentFrequencyMatcher {
    fn name(&self) -> &'static str {
        "content_frequency"
    }

    fn locate(&self, table: &SpreadsheetTable) -> Option<ColumnMatch> {
        let mut counts = vec![0_usize; table.width()];
        let mut sampled = 0_usize;
        for (_, row) in table.data_rows().take(self.sample_rows) {
            sampled += 1;
            for (column, text) in row.iter().enumerate() {
                if ObjectReference::is_reference(text) {
                    counts[column] += 1;
                }
            }
        }

        let mut best: Option<(usize, usize)> = None;
        for (column, &count) in counts.iter().enumerate() {
            if count > best.map_or(0, |(_, hits)| hits) {
                best = Some((column, count));
            }
        }

        best.map(|(index, hits)| {
            #[allow(clippy::cast_precision_loss)]
            let confidence = hits as f64 / sampled as f64;
            ColumnMatch { index, confidence }
        })
    }
}

/// Ordered set of matchers; the first non-empty answer wins.
pub struct ColumnLocator {
    matchers: Vec<Box<dyn ColumnMatcher>>,
}

impl std::fmt::Debug for ColumnLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.matchers.iter().map(|matcher| matcher.name()))
            .finish()
    }
}

impl Default for ColumnLocator {
    fn default() -> Self {
        Self::with_extra_headers(std::iter::empty::<&str>())
    }
}

impl ColumnLocator {
    /// Creates a locator from an explicit matcher list.
    #[must_use]
    pub fn new(matchers: Vec<Box<dyn ColumnMatcher>>) -> Self {
        Self { matchers }
    }

    /// Default matchers, with extra accepted header names.
    pub fn with_extra_headers<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(vec![
            Box::new(HeaderNameMatcher::default().with_extra_names(names)),
            Box::new(ContentFrequencyMatcher::default()),
        ])
    }

    /// Returns the reference column, or `None` if no matcher found one.
    #[must_use]
    pub fn locate(&self, table: &SpreadsheetTable) -> Option<ColumnMatch> {
        for matcher in &self.matchers {
            if let Some(found) = matcher.locate(table) {
                tracing::debug!(
                    matcher = matcher.name(),
                    column = found.index,
                    confidence = found.confidence,
                    "located reference column"
                );
                return Some(found);
            }
        }
        None
    }
}
