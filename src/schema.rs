// 📐 Schema Catalog - fixed target shapes for every LinkedIn export sheet
// Columns are renamed by POSITION, so the order below is the contract.

use serde::{Deserialize, Serialize};

// ============================================================================
// COLUMN TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Calendar date, no time of day
    Date,
    /// Counts; repaired cells may become fractional
    Integer,
    Float,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnType,
}

const fn col(name: &'static str, kind: ColumnType) -> ColumnSpec {
    ColumnSpec { name, kind }
}

use ColumnType::{Date, Float, Integer, Text};

pub const DATE_COLUMN: &str = "Date";

/// Column that content metrics carries in from the export
pub const SOURCE_ENGAGEMENT_COLUMN: &str = "Engagement rate";

/// Column written after the engagement ratio is recomputed
pub const REPAIRED_ENGAGEMENT_COLUMN: &str = "Engagement Rate";

// ============================================================================
// SOURCE SCHEMAS (as exported by LinkedIn, translated to English)
// ============================================================================

const CONTENT_METRICS: &[ColumnSpec] = &[
    col("Date", Date),
    col("Impressions (organic)", Integer),
    col("Impressions (sponsored)", Integer),
    col("Impressions", Integer),
    col("Unique impressions (organic)", Integer),
    col("Clicks (organic)", Integer),
    col("Clicks (sponsored)", Integer),
    col("Clicks", Integer),
    col("Reactions (organic)", Integer),
    col("Reactions (sponsored)", Integer),
    col("Reactions", Integer),
    col("Comments (organic)", Integer),
    col("Comments (sponsored)", Integer),
    col("Comments", Integer),
    col("Shares (organic)", Integer),
    col("Shares (sponsored)", Integer),
    col("Shares", Integer),
    col("Engagement rate (organic)", Float),
    col("Engagement rate (sponsored)", Float),
    col("Engagement rate", Float),
];

/// Shape of the content metrics series after invalid counts are repaired
const CONTENT_METRICS_REPAIRED: &[ColumnSpec] = &[
    col("Date", Date),
    col("Impressions", Integer),
    col("Clicks", Integer),
    col("Reactions", Integer),
    col("Comments", Integer),
    col("Shares", Integer),
    col("Engagement Rate", Float),
];

const CONTENT_POSTS: &[ColumnSpec] = &[
    col("Post Title", Text),
    col("Post Link", Text),
    col("Post Type", Text),
    col("Campaign Name", Text),
    col("Published by", Text),
    col("Date", Date),
    col("Campaign Start Date", Date),
    col("Campaign End Date", Date),
    col("Audience", Text),
    col("Impressions", Integer),
    col("Views (excluding off-site video views)", Integer),
    col("Off-site Views", Integer),
    col("Clicks", Integer),
    col("Click-Through Rate (CTR)", Float),
    col("Likes", Integer),
    col("Comments", Integer),
    col("Shares", Integer),
    col("Followers", Integer),
    col("Engagement Rate", Float),
    col("Content Type", Text),
];

const FOLLOWERS_NEW: &[ColumnSpec] = &[
    col("Date", Date),
    col("Followers Sponsored", Integer),
    col("Followers Organic", Integer),
    col("Total Followers", Integer),
];

const FOLLOWERS_LOCATION: &[ColumnSpec] = &[col("Location", Text), col("Total Followers", Integer)];
const FOLLOWERS_FUNCTION: &[ColumnSpec] = &[col("Function", Text), col("Total Followers", Integer)];
const FOLLOWERS_EXPERIENCE: &[ColumnSpec] =
    &[col("Experience Level", Text), col("Total Followers", Integer)];
const FOLLOWERS_INDUSTRY: &[ColumnSpec] = &[col("Industry", Text), col("Total Followers", Integer)];
const FOLLOWERS_COMPANY_SIZE: &[ColumnSpec] =
    &[col("Company Size", Text), col("Total Followers", Integer)];

const VISITORS_METRICS: &[ColumnSpec] = &[
    col("Date", Date),
    col("Page Views Overview (Desktop)", Integer),
    col("Page Views Overview (Mobile Devices)", Integer),
    col("Page Views Overview (Total)", Integer),
    col("Unique Visitors Overview (Desktop)", Integer),
    col("Unique Visitors Overview (Mobile Devices)", Integer),
    col("Unique Visitors Overview (Total)", Integer),
    col("Page Views Day by Day (Desktop)", Integer),
    col("Page Views Day by Day (Mobile Devices)", Integer),
    col("Page Views Day by Day (Total)", Integer),
    col("Unique Visitors Day by Day (Desktop)", Integer),
    col("Unique Visitors Day by Day (Mobile Devices)", Integer),
    col("Unique Visitors Day by Day (Total)", Integer),
    col("Page Views Jobs (Desktop)", Integer),
    col("Page Views Jobs (Mobile Devices)", Integer),
    col("Page Views Jobs (Total)", Integer),
    col("Unique Visitors Jobs (Desktop)", Integer),
    col("Unique Visitors Jobs (Mobile Devices)", Integer),
    col("Unique Visitors Jobs (Total)", Integer),
    col("Total Page Views (Desktop)", Integer),
    col("Total Page Views (Mobile Devices)", Integer),
    col("Total Page Views (Total)", Integer),
    col("Total Unique Visitors (Desktop)", Integer),
    col("Total Unique Visitors (Mobile Devices)", Integer),
    col("Total Unique Visitors (Total)", Integer),
];

const VISITORS_LOCATION: &[ColumnSpec] = &[col("Location", Text), col("Total Views", Integer)];
const VISITORS_FUNCTION: &[ColumnSpec] = &[col("Function", Text), col("Total Views", Integer)];
const VISITORS_EXPERIENCE: &[ColumnSpec] =
    &[col("Experience Level", Text), col("Total Views", Integer)];
const VISITORS_INDUSTRY: &[ColumnSpec] = &[col("Industry", Text), col("Total Views", Integer)];
const VISITORS_COMPANY_SIZE: &[ColumnSpec] =
    &[col("Company Size", Text), col("Total Views", Integer)];

const COMPETITORS: &[ColumnSpec] = &[
    col("Page", Text),
    col("Total Followers", Integer),
    col("New Followers", Integer),
    col("Total Post Engagements", Float),
    col("Total Posts", Integer),
];

/// Header sets the competitor export is known to carry (Portuguese, English).
/// When one matches, those columns are picked out before positional renaming.
const COMPETITOR_HEADER_SETS: &[&[&str]] = &[
    &[
        "Page",
        "Total de seguidores",
        "Novos seguidores",
        "Total de engajamentos da publicação",
        "Total de publicações",
    ],
    &[
        "Page",
        "Total followers",
        "New followers",
        "Total post engagements",
        "Total posts",
    ],
];

// ============================================================================
// GROUPING FILES
// ============================================================================

/// One of the four files found in every extraction folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Grouping {
    Competitor,
    Content,
    Followers,
    Visitors,
}

impl Grouping {
    /// Discovery order; a filename matching several groupings goes to the first
    pub const ALL: [Grouping; 4] = [
        Grouping::Competitor,
        Grouping::Content,
        Grouping::Followers,
        Grouping::Visitors,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Grouping::Competitor => "competitor",
            Grouping::Content => "content",
            Grouping::Followers => "followers",
            Grouping::Visitors => "visitors",
        }
    }

    /// Lowercase filename substrings (Portuguese and English exports)
    pub fn synonyms(&self) -> &'static [&'static str] {
        match self {
            Grouping::Competitor => &["concorrente", "competitor"],
            Grouping::Content => &["conteudo", "conteúdo", "content"],
            Grouping::Followers => &["seguidor", "followers"],
            Grouping::Visitors => &["visitante", "visitors"],
        }
    }

    pub fn matches(&self, filename: &str) -> bool {
        let lower = filename.to_lowercase();
        self.synonyms().iter().any(|s| lower.contains(s))
    }
}

// ============================================================================
// CATEGORIES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    ContentMetrics,
    ContentPosts,
    FollowersNew,
    FollowersLocation,
    FollowersFunction,
    FollowersExperience,
    FollowersIndustry,
    FollowersCompanySize,
    VisitorsMetrics,
    VisitorsLocation,
    VisitorsFunction,
    VisitorsExperience,
    VisitorsIndustry,
    VisitorsCompanySize,
    Competitors,
}

impl Category {
    /// Processing order: content metrics first, it provides the reference date
    pub const ALL: [Category; 15] = [
        Category::ContentMetrics,
        Category::ContentPosts,
        Category::FollowersNew,
        Category::FollowersLocation,
        Category::FollowersFunction,
        Category::FollowersExperience,
        Category::FollowersIndustry,
        Category::FollowersCompanySize,
        Category::VisitorsMetrics,
        Category::VisitorsLocation,
        Category::VisitorsFunction,
        Category::VisitorsExperience,
        Category::VisitorsIndustry,
        Category::VisitorsCompanySize,
        Category::Competitors,
    ];

    /// Series file stem and log name
    pub fn name(&self) -> &'static str {
        match self {
            Category::ContentMetrics => "content_metrics",
            Category::ContentPosts => "content_posts",
            Category::FollowersNew => "followers_new",
            Category::FollowersLocation => "followers_location",
            Category::FollowersFunction => "followers_function",
            Category::FollowersExperience => "followers_experience",
            Category::FollowersIndustry => "followers_industry",
            Category::FollowersCompanySize => "followers_company_size",
            Category::VisitorsMetrics => "visitors_metrics",
            Category::VisitorsLocation => "visitors_location",
            Category::VisitorsFunction => "visitors_function",
            Category::VisitorsExperience => "visitors_experience",
            Category::VisitorsIndustry => "visitors_industry",
            Category::VisitorsCompanySize => "visitors_company_size",
            Category::Competitors => "competitors",
        }
    }

    pub fn grouping(&self) -> Grouping {
        match self {
            Category::ContentMetrics | Category::ContentPosts => Grouping::Content,
            Category::FollowersNew
            | Category::FollowersLocation
            | Category::FollowersFunction
            | Category::FollowersExperience
            | Category::FollowersIndustry
            | Category::FollowersCompanySize => Grouping::Followers,
            Category::VisitorsMetrics
            | Category::VisitorsLocation
            | Category::VisitorsFunction
            | Category::VisitorsExperience
            | Category::VisitorsIndustry
            | Category::VisitorsCompanySize => Grouping::Visitors,
            Category::Competitors => Grouping::Competitor,
        }
    }

    /// Zero-based sheet index inside the grouping file
    pub fn sheet_position(&self) -> usize {
        match self {
            Category::ContentMetrics
            | Category::FollowersNew
            | Category::VisitorsMetrics
            | Category::Competitors => 0,
            Category::ContentPosts | Category::FollowersLocation | Category::VisitorsLocation => 1,
            Category::FollowersFunction | Category::VisitorsFunction => 2,
            Category::FollowersExperience | Category::VisitorsExperience => 3,
            Category::FollowersIndustry | Category::VisitorsIndustry => 4,
            Category::FollowersCompanySize | Category::VisitorsCompanySize => 5,
        }
    }

    /// Rows above the header (content and competitor exports carry a title row)
    pub fn skip_rows(&self) -> usize {
        match self.grouping() {
            Grouping::Content | Grouping::Competitor => 1,
            Grouping::Followers | Grouping::Visitors => 0,
        }
    }

    /// Columns as they arrive, by position
    pub fn source_columns(&self) -> &'static [ColumnSpec] {
        match self {
            Category::ContentMetrics => CONTENT_METRICS,
            Category::ContentPosts => CONTENT_POSTS,
            Category::FollowersNew => FOLLOWERS_NEW,
            Category::FollowersLocation => FOLLOWERS_LOCATION,
            Category::FollowersFunction => FOLLOWERS_FUNCTION,
            Category::FollowersExperience => FOLLOWERS_EXPERIENCE,
            Category::FollowersIndustry => FOLLOWERS_INDUSTRY,
            Category::FollowersCompanySize => FOLLOWERS_COMPANY_SIZE,
            Category::VisitorsMetrics => VISITORS_METRICS,
            Category::VisitorsLocation => VISITORS_LOCATION,
            Category::VisitorsFunction => VISITORS_FUNCTION,
            Category::VisitorsExperience => VISITORS_EXPERIENCE,
            Category::VisitorsIndustry => VISITORS_INDUSTRY,
            Category::VisitorsCompanySize => VISITORS_COMPANY_SIZE,
            Category::Competitors => COMPETITORS,
        }
    }

    /// Columns of the persisted HistoricalSeries
    ///
    /// Content metrics is reduced to its repaired shape; categories without
    /// their own time axis get the batch reference `Date` in front.
    pub fn series_columns(&self) -> Vec<ColumnSpec> {
        if *self == Category::ContentMetrics {
            return CONTENT_METRICS_REPAIRED.to_vec();
        }

        let source = self.source_columns();
        if self.has_own_date() {
            source.to_vec()
        } else {
            std::iter::once(col(DATE_COLUMN, Date))
                .chain(source.iter().copied())
                .collect()
        }
    }

    pub fn series_column_names(&self) -> Vec<&'static str> {
        self.series_columns().iter().map(|c| c.name).collect()
    }

    /// Whether the export itself carries a `Date` column
    pub fn has_own_date(&self) -> bool {
        self.source_columns().iter().any(|c| c.name == DATE_COLUMN)
    }

    /// Natural key used to de-duplicate the series, if any.
    /// Breakdowns and competitors are snapshots and simply accumulate.
    pub fn unique_key(&self) -> Option<&'static str> {
        match self {
            Category::ContentMetrics | Category::FollowersNew | Category::VisitorsMetrics => {
                Some(DATE_COLUMN)
            }
            Category::ContentPosts => Some("Post Link"),
            _ => None,
        }
    }

    /// Known raw header sets to select from before renaming
    pub fn header_selections(&self) -> &'static [&'static [&'static str]] {
        match self {
            Category::Competitors => COMPETITOR_HEADER_SETS,
            _ => &[],
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::fmt::Display for Grouping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_names_are_distinct() {
        let mut names: Vec<&str> = Category::ALL.iter().map(|c| c.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Category::ALL.len());
    }

    #[test]
    fn test_content_metrics_series_is_repaired_shape() {
        let names = Category::ContentMetrics.series_column_names();
        assert_eq!(
            names,
            vec![
                "Date",
                "Impressions",
                "Clicks",
                "Reactions",
                "Comments",
                "Shares",
                "Engagement Rate"
            ]
        );
    }

    #[test]
    fn test_breakdown_series_gets_date_first() {
        let names = Category::FollowersLocation.series_column_names();
        assert_eq!(names, vec!["Date", "Location", "Total Followers"]);
        assert!(!Category::FollowersLocation.has_own_date());
        assert!(!Category::Competitors.has_own_date());
    }

    #[test]
    fn test_dated_categories_keep_source_shape() {
        assert!(Category::FollowersNew.has_own_date());
        assert!(Category::ContentPosts.has_own_date());
        assert_eq!(
            Category::VisitorsMetrics.series_columns().len(),
            Category::VisitorsMetrics.source_columns().len()
        );
    }

    #[test]
    fn test_unique_keys() {
        assert_eq!(Category::ContentMetrics.unique_key(), Some("Date"));
        assert_eq!(Category::FollowersNew.unique_key(), Some("Date"));
        assert_eq!(Category::VisitorsMetrics.unique_key(), Some("Date"));
        assert_eq!(Category::ContentPosts.unique_key(), Some("Post Link"));
        assert_eq!(Category::FollowersIndustry.unique_key(), None);
        assert_eq!(Category::Competitors.unique_key(), None);
    }

    #[test]
    fn test_grouping_synonyms() {
        assert!(Grouping::Competitor.matches("concorrentes_2024.xlsx"));
        assert!(Grouping::Content.matches("Conteúdo_empresa.xls"));
        assert!(Grouping::Content.matches("company_content_1700000000.xls"));
        assert!(Grouping::Followers.matches("SEGUIDORES.xls"));
        assert!(Grouping::Visitors.matches("visitors.xls"));
        assert!(!Grouping::Visitors.matches("followers.xls"));
    }

    #[test]
    fn test_every_category_has_one_grouping_slot() {
        let mut total = 0;
        for grouping in Grouping::ALL {
            let categories: Vec<Category> = Category::ALL
                .iter()
                .copied()
                .filter(|c| c.grouping() == grouping)
                .collect();
            let mut positions: Vec<usize> =
                categories.iter().map(|c| c.sheet_position()).collect();
            positions.sort();
            positions.dedup();
            assert_eq!(positions.len(), categories.len(), "{} sheet clash", grouping);
            total += categories.len();
        }
        assert_eq!(total, Category::ALL.len());
    }

    #[test]
    fn test_skip_rows() {
        assert_eq!(Category::ContentMetrics.skip_rows(), 1);
        assert_eq!(Category::Competitors.skip_rows(), 1);
        assert_eq!(Category::VisitorsIndustry.skip_rows(), 0);
    }
}
