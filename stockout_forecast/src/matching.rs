//! Match free-text reports against known names
//!
//! Incident reports mention sectors and resources by name. A name matches
//! when it occurs anywhere in the text, ignoring case. When several names
//! match, the one listed first wins.

use serde::Serialize;

/// Sector and resource a report names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportMatch<'a> {
    pub sector: Option<&'a str>,
    pub resource: Option<&'a str>,
}

impl<'a> ReportMatch<'a> {
    /// Match a report against sector and resource names. A field the text
    /// does not mention stays `None`.
    pub fn find<S: AsRef<str>>(text: &str, sectors: &'a [S], resources: &'a [S]) -> Self {
        Self {
            sector: match_mention(text, sectors),
            resource: match_mention(text, resources),
        }
    }

    /// Fill unmatched fields with the first candidate
    pub fn or_first<S: AsRef<str>>(self, sectors: &'a [S], resources: &'a [S]) -> Self {
        Self {
            sector: self.sector.or_else(|| sectors.first().map(AsRef::as_ref)),
            resource: self.resource.or_else(|| resources.first().map(AsRef::as_ref)),
        }
    }
}

/// Position of the first name that occurs in `text`
pub fn match_mention_index<S: AsRef<str>>(text: &str, names: &[S]) -> Option<usize> {
    let haystack = text.to_lowercase();
    names.iter().position(|name| {
        let name = name.as_ref().trim();
        !name.is_empty() && haystack.contains(&name.to_lowercase())
    })
}

/// First name that occurs in `text`
pub fn match_mention<'a, S: AsRef<str>>(text: &str, names: &'a [S]) -> Option<&'a str> {
    match_mention_index(text, names).map(|i| names[i].as_ref())
}

/// First name that occurs in `text`, or the first name when none does
pub fn match_mention_or_first<'a, S: AsRef<str>>(text: &str, names: &'a [S]) -> Option<&'a str> {
    match_mention(text, names).or_else(|| names.first().map(AsRef::as_ref))
}
