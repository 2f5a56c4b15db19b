use std::{
    fmt::{Display, Formatter},
    hash::{Hash, Hasher},
};

use itertools::Itertools;

/// Rule recognising a supplier tariff code, such as `E-1R-AGILE-24-10-01-A`.
#[derive(Copy, Clone, Debug)]
pub enum Matcher {
    Prefix(&'static str),
    Contains(&'static str),
    AllOf(&'static [Self]),
    AnyOf(&'static [Self]),
    Not(&'static Self),
}

impl Matcher {
    pub fn matches(self, tariff_code: &str) -> bool {
        match self {
            Self::Prefix(prefix) => tariff_code.starts_with(prefix),
            Self::Contains(needle) => tariff_code.contains(needle),
            Self::AllOf(matchers) => matchers.iter().all(|matcher| matcher.matches(tariff_code)),
            Self::AnyOf(matchers) => matchers.iter().any(|matcher| matcher.matches(tariff_code)),
            Self::Not(matcher) => !matcher.matches(tariff_code),
        }
    }
}

/// Reference data describing a tariff the bot knows about.
///
/// Identity is the [`Tariff::id`]. The product code to switch to is resolved on every run
/// and travels with the comparison instead of living here.
#[derive(Copy, Clone, Debug)]
pub struct Tariff {
    pub id: &'static str,
    pub display_name: &'static str,

    /// Display name of the supplier product.
    pub api_display_name: &'static str,

    pub matcher: Matcher,

    /// Whether the bot may switch to the tariff on its own.
    pub switchable: bool,
}

impl PartialEq for Tariff {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Tariff {}

impl Hash for Tariff {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Display for Tariff {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name)
    }
}

const NOT_INTELLIGENT: Matcher = Matcher::Not(&Matcher::Contains("INTELLI"));

pub const CATALOG: &[Tariff] = &[
    Tariff {
        id: "flexible",
        display_name: "Flexible",
        api_display_name: "Flexible Octopus",
        matcher: Matcher::AllOf(&[
            Matcher::Contains("-VAR-"),
            Matcher::Not(&Matcher::Contains("-GO-")),
            NOT_INTELLIGENT,
        ]),
        switchable: true,
    },
    Tariff {
        id: "agile",
        display_name: "Agile",
        api_display_name: "Agile Octopus",
        matcher: Matcher::Contains("AGILE"),
        switchable: true,
    },
    Tariff {
        id: "go",
        display_name: "Go",
        api_display_name: "Octopus Go",
        matcher: Matcher::AllOf(&[Matcher::Contains("-GO-"), NOT_INTELLIGENT]),
        switchable: true,
    },
    Tariff {
        id: "intelligent_go",
        display_name: "Intelligent Go",
        api_display_name: "Intelligent Octopus Go",
        matcher: Matcher::Contains("INTELLI"),
        switchable: false,
    },
    Tariff {
        id: "cosy",
        display_name: "Cosy",
        api_display_name: "Cosy Octopus",
        matcher: Matcher::Contains("COSY"),
        switchable: true,
    },
    Tariff {
        id: "tracker",
        display_name: "Tracker",
        api_display_name: "Octopus Tracker",
        matcher: Matcher::AnyOf(&[Matcher::Contains("SILVER"), Matcher::Contains("TRACKER")]),
        switchable: false,
    },
];

impl Tariff {
    pub fn is_tariff(&self, tariff_code: &str) -> bool {
        self.matcher.matches(tariff_code)
    }

    pub fn lookup(id: &str) -> Option<Self> {
        CATALOG.iter().find(|tariff| tariff.id.eq_ignore_ascii_case(id.trim())).copied()
    }

    /// Recognise the account's tariff code among the known tariffs.
    pub fn identify(tariff_code: &str) -> Option<Self> {
        CATALOG.iter().find(|tariff| tariff.is_tariff(tariff_code)).copied()
    }

    /// Resolve the configured IDs, preserving their order and dropping duplicates.
    ///
    /// Returns the resolved tariffs and the IDs that matched nothing.
    pub fn resolve_all<S: AsRef<str>>(ids: &[S]) -> (Vec<Self>, Vec<String>) {
        let (tariffs, unknown): (Vec<_>, Vec<_>) = ids
            .iter()
            .map(AsRef::as_ref)
            .filter(|id| !id.trim().is_empty())
            .map(|id| Self::lookup(id).ok_or_else(|| id.trim().to_string()))
            .partition_result();
        (tariffs.into_iter().unique().collect(), unknown)
    }
}
