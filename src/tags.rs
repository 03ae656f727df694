use std::fmt::{Display, Formatter};
use std::sync::LazyLock;
use regex::Regex;
use serde::{Deserialize, Serialize};

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#[A-Za-z0-9_-]+").unwrap());

/// Returns every `#tag` token of `text`, left to right, duplicates included.
pub fn extract_tags(text: &str) -> Vec<String> {
    TAG_RE.find_iter(text).map(|x| x.as_str().to_string()).collect()
}

/// Turns a tag taken from a URL segment (`rust` or `#rust`) into a token.
pub fn normalize_tag(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with('#') {
        raw.to_string()
    } else {
        format!("#{}", raw)
    }
}

/// An ordered set of tag tokens.
///
/// Membership is exact token equality, so `#dev` and `#devops` never match
/// each other. The textual form puts a single space after every token
/// (`"#a #b "`), which is what the entry form shows.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct TagList(Vec<String>);

impl TagList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extracts the tags of free text, keeping the first occurrence of each.
    pub fn parse(text: &str) -> Self {
        extract_tags(text).into_iter().collect()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|x| x == tag)
    }

    /// Appends `tag` unless it is already present. Returns whether it was added.
    pub fn insert(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        if self.contains(&tag) {
            return false;
        }
        self.0.push(tag);
        true
    }

    pub fn retain(&mut self, mut f: impl FnMut(&str) -> bool) {
        self.0.retain(|x| f(x));
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|x| x.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for TagList {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for tag in &self.0 {
            write!(f, "{} ", tag)?;
        }
        Ok(())
    }
}

impl FromIterator<String> for TagList {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        let mut list = TagList::new();
        for tag in iter {
            list.insert(tag);
        }
        list
    }
}

impl<'a> FromIterator<&'a str> for TagList {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        iter.into_iter().map(|x| x.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_tags() {
        assert_eq!(extract_tags("no tags here"), Vec::<String>::new());
        assert_eq!(extract_tags("#a #b-2 text #c_d"), vec!["#a", "#b-2", "#c_d"]);
        assert_eq!(extract_tags("#x,#y;#x"), vec!["#x", "#y", "#x"]);
        assert_eq!(extract_tags("# lonely hash and mail@host#tag"), vec!["#tag"]);
        assert_eq!(extract_tags("#Rust #rust"), vec!["#Rust", "#rust"]);
    }

    #[test]
    fn test_extracted_tokens_are_well_formed() {
        let text = "mixed #one! (#two) #thr.ee ##four #fünf #_six- end#";
        let tags = extract_tags(text);
        let token = Regex::new(r"^#[A-Za-z0-9_-]+$").unwrap();
        assert!(tags.iter().all(|x| token.is_match(x)));

        let mut cursor = 0;
        for tag in &tags {
            let found = text[cursor..].find(tag.as_str()).unwrap();
            cursor += found + tag.len();
        }
    }

    #[test]
    fn test_tag_list_parse_dedups_in_order() {
        let tags = TagList::parse("#rust learning #web #rust");
        assert_eq!(tags.iter().collect::<Vec<_>>(), vec!["#rust", "#web"]);
        assert_eq!(tags.to_string(), "#rust #web ");
        assert_eq!(TagList::parse("nothing").to_string(), "");
    }

    #[test]
    fn test_tag_list_membership_is_exact() {
        let tags = TagList::parse("#devops");
        assert!(tags.contains("#devops"));
        assert!(!tags.contains("#dev"));
        assert!(!tags.contains("devops"));
    }

    #[test]
    fn test_tag_list_insert_and_retain() {
        let mut tags = TagList::new();
        assert!(tags.insert("#a"));
        assert!(tags.insert("#b"));
        assert!(!tags.insert("#a"));
        tags.retain(|x| x != "#a");
        assert_eq!(tags.iter().collect::<Vec<_>>(), vec!["#b"]);
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn test_tag_list_serializes_as_array() {
        let tags = TagList::parse("#a #b");
        assert_eq!(serde_json::to_string(&tags).unwrap(), r##"["#a","#b"]"##);
        let back: TagList = serde_json::from_str(r##"["#a","#b"]"##).unwrap();
        assert_eq!(back, tags);
    }

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("rust"), "#rust");
        assert_eq!(normalize_tag("#rust"), "#rust");
        assert_eq!(normalize_tag(" web "), "#web");
    }
}
