//! Link descriptor parsing
//!
//! A class-help link declares everything the picker needs in data
//! attributes:
//!
//! ```text
//! <a data-helpurl="user?type=checkbox&form=itemSynopsis&property=nosy&@startwith=0&@pagesize=10&properties=id,username"
//!    data-width="600" data-height="600">(list)</a>
//! ```
//!
//! Parsing is all-or-nothing: the first failing check rejects the whole
//! descriptor and nothing downstream ever sees a partial one.

use tracing::warn;
use url::form_urlencoded;

use crate::error::DescriptorError;
use crate::host::LinkElement;

pub const HELPURL: &str = "helpurl";
pub const WIDTH: &str = "width";
pub const HEIGHT: &str = "height";

/// Whether the picker is meant to pick one record or many.
///
/// Advisory only: the accumulator always behaves as a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    Single,
    #[default]
    Multi,
}

impl SelectionMode {
    fn from_param(value: Option<&str>) -> Self {
        match value {
            Some("radio") | Some("single") => Self::Single,
            _ => Self::Multi,
        }
    }
}

/// Where the accumulated selection is written back in the opener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteTarget {
    /// Form name; `None` means the first field with a matching name.
    pub form: Option<String>,
    pub field: String,
}

/// Validated configuration of one class-help link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkDescriptor {
    /// REST class to list, e.g. `issue` or `user`.
    pub collection_path: String,
    pub popup_width: u32,
    pub popup_height: u32,
    pub target: Option<WriteTarget>,
    pub selection_mode: SelectionMode,
    pub page_size: u32,
    /// 1-based, `@startwith + 1`.
    pub initial_page_index: u32,
    pub sort_spec: Vec<String>,
    /// Table columns; the first one is the row's identity key.
    pub display_fields: Vec<String>,
}

impl LinkDescriptor {
    pub fn from_link(link: &dyn LinkElement) -> Result<Self, DescriptorError> {
        Self::from_attributes(|name| link.data_attribute(name))
    }

    /// Parse from a data-attribute lookup.
    ///
    /// Checks run in a fixed order and the first failure is returned:
    /// helpurl, width, height presence; width and height numeric; helpurl
    /// shape; `@startwith`; `@pagesize`; `properties`.
    pub fn from_attributes<F>(attribute: F) -> Result<Self, DescriptorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let helpurl = attribute(HELPURL)
            .filter(|v| !v.is_empty())
            .ok_or(DescriptorError::MissingAttribute(HELPURL))?;
        let width = attribute(WIDTH)
            .filter(|v| !v.is_empty())
            .ok_or(DescriptorError::MissingAttribute(WIDTH))?;
        let height = attribute(HEIGHT)
            .filter(|v| !v.is_empty())
            .ok_or(DescriptorError::MissingAttribute(HEIGHT))?;

        let popup_width = positive(WIDTH, &width)?;
        let popup_height = positive(HEIGHT, &height)?;

        let (class, query) = match helpurl.split('?').collect::<Vec<_>>()[..] {
            [class, query] if !class.is_empty() => (class.to_string(), query),
            _ => return Err(DescriptorError::InvalidHelpUrl(helpurl.clone())),
        };
        let params = HelpUrlParams::parse(query);

        let start_with = number("startwith", params.get("@startwith").unwrap_or(""))?;
        if start_with < 0 {
            return Err(DescriptorError::Negative {
                attribute: "startwith",
                value: start_with,
            });
        }
        let initial_page_index = u32::try_from(start_with)
            .ok()
            .and_then(|start| start.checked_add(1))
            .ok_or(DescriptorError::OutOfRange {
                attribute: "startwith",
                value: start_with,
            })?;
        let page_size = positive("pagesize", params.get("@pagesize").unwrap_or(""))?;

        let display_fields = split_list(params.get("properties").unwrap_or(""));
        if display_fields.is_empty() {
            return Err(DescriptorError::MissingParameter("properties"));
        }

        let target = params
            .get("property")
            .filter(|field| !field.is_empty())
            .map(|field| WriteTarget {
                form: params
                    .get("form")
                    .filter(|form| !form.is_empty())
                    .map(str::to_string),
                field: field.to_string(),
            });

        Ok(Self {
            collection_path: class,
            popup_width,
            popup_height,
            target,
            selection_mode: SelectionMode::from_param(params.get("type")),
            page_size,
            initial_page_index,
            sort_spec: split_list(params.get("@sort").unwrap_or("")),
            display_fields,
        })
    }

    /// The identity-key field of every row; `None` without display fields.
    pub fn key_field(&self) -> Option<&str> {
        self.display_fields.first().map(String::as_str)
    }
}

/// Decoded helpurl query; first occurrence of a key wins.
struct HelpUrlParams(Vec<(String, String)>);

impl HelpUrlParams {
    fn parse(query: &str) -> Self {
        Self(form_urlencoded::parse(query.as_bytes()).into_owned().collect())
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn number(attribute: &'static str, value: &str) -> Result<i64, DescriptorError> {
    parse_int_prefix(value).ok_or_else(|| DescriptorError::NotANumber {
        attribute,
        value: value.to_string(),
    })
}

fn positive(attribute: &'static str, value: &str) -> Result<u32, DescriptorError> {
    let n = number(attribute, value)?;
    if n <= 0 {
        return Err(DescriptorError::NotPositive {
            attribute,
            value: n,
        });
    }
    u32::try_from(n).map_err(|_| DescriptorError::OutOfRange {
        attribute,
        value: n,
    })
}

/// Leading-integer parse: optional sign then digits, trailing text ignored.
///
/// `"600px"` is 600, `"abc"` is not a number.
pub(crate) fn parse_int_prefix(value: &str) -> Option<i64> {
    let trimmed = value.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return None;
    }
    let magnitude: i64 = rest[..digits_end].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

// ============================================================================
// SEARCH FIELDS
// ============================================================================

/// Sort directive of a dropdown source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    /// Value of the `@sort` query parameter.
    pub fn param(&self) -> String {
        if self.descending {
            format!("-{}", self.field)
        } else {
            self.field.clone()
        }
    }
}

/// A dropdown search field, optionally sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropdownSpec {
    pub sort: Option<SortKey>,
}

/// One entry of the wrapper's `searchWith` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchField {
    pub name: String,
    pub dropdown: Option<DropdownSpec>,
}

impl SearchField {
    /// Parse `searchWith`: `name`, `name[]` or `name[]+sortfield` /
    /// `name[]-sortfield`, comma separated.
    ///
    /// Never fails; a malformed suffix degrades to a plain text field.
    pub fn parse_list(attribute: &str) -> Vec<Self> {
        attribute
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .filter_map(Self::parse)
            .collect()
    }

    fn parse(entry: &str) -> Option<Self> {
        let Some((name, suffix)) = entry.split_once("[]") else {
            return Some(Self::text(entry));
        };
        if name.is_empty() {
            warn!(entry, "search field without a name, skipping");
            return None;
        }

        let sort = match suffix.chars().next() {
            None => None,
            Some(sign @ ('+' | '-')) if suffix.len() > 1 => Some(SortKey {
                field: suffix[1..].to_string(),
                descending: sign == '-',
            }),
            Some(_) => {
                warn!(entry, "unrecognised dropdown suffix, using a text field");
                return Some(Self::text(name));
            }
        };

        Some(Self {
            name: name.to_string(),
            dropdown: Some(DropdownSpec { sort }),
        })
    }

    fn text(name: &str) -> Self {
        Self {
            name: name.to_string(),
            dropdown: None,
        }
    }
}
