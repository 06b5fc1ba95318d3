use time::{Date, Month};

const INDONESIAN_MONTHS: [&str; 12] = [
    "Januari",
    "Februari",
    "Maret",
    "April",
    "Mei",
    "Juni",
    "Juli",
    "Agustus",
    "September",
    "Oktober",
    "November",
    "Desember",
];

const ENGLISH_MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthTable {
    names: Vec<String>,
}

impl MonthTable {
    pub fn indonesian() -> Self {
        Self::from_static(&INDONESIAN_MONTHS)
    }

    pub fn english() -> Self {
        Self::from_static(&ENGLISH_MONTHS)
    }

    /// Builds a table from twelve names, January first. Any other length
    /// yields `None`.
    pub fn from_names(names: Vec<String>) -> Option<Self> {
        (names.len() == 12).then(|| Self {
            names: names.into_iter().map(|name| name.to_lowercase()).collect(),
        })
    }

    fn from_static(names: &[&str; 12]) -> Self {
        Self {
            names: names.iter().map(|name| name.to_lowercase()).collect(),
        }
    }

    fn month(&self, name: &str) -> Option<Month> {
        let lowered = name.to_lowercase();
        let position = self.names.iter().position(|candidate| *candidate == lowered)?;
        Month::try_from(position as u8 + 1).ok()
    }
}

impl Default for MonthTable {
    fn default() -> Self {
        Self::indonesian()
    }
}

/// Parses `<day> <month name> <year>`, e.g. `25 Maret 2020`.
pub fn parse_added_on(raw: &str, months: &MonthTable) -> Option<Date> {
    let mut parts = raw.split_whitespace();
    let day: u8 = parts.next()?.parse().ok()?;
    let month = months.month(parts.next()?)?;
    let year: i32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Date::from_calendar_date(year, month, day).ok()
}

/// Sort key for the added date; missing or unparseable values sort as the
/// unix epoch.
pub fn added_sort_key(raw: Option<&str>, months: &MonthTable) -> Date {
    raw.and_then(|value| parse_added_on(value, months))
        .unwrap_or(EPOCH)
}

pub const EPOCH: Date = match Date::from_calendar_date(1970, Month::January, 1) {
    Ok(date) => date,
    Err(_) => panic!("epoch is a valid date"),
};
