//! Sort direction

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    /// Lenient parse: anything but "desc"/"descending" is ascending
    pub fn parse(direction: &str) -> Self {
        match direction.trim().to_ascii_lowercase().as_str() {
            "desc" | "descending" => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }
}

impl From<&str> for SortDirection {
    fn from(direction: &str) -> Self {
        SortDirection::parse(direction)
    }
}
