use scraper::Html;
use serde::{Deserialize, Serialize};

// Fallback display values for fields the API leaves out
pub const FALLBACK_TITLE: &str = "No title available";
pub const FALLBACK_EMPLOYMENT_TYPE: &str = "Not specified";
pub const FALLBACK_DESCRIPTION: &str = "No description available";
pub const FALLBACK_LOCATION: &str = "Location not specified";
pub const FALLBACK_PACKAGE: &str = "Salary not specified";
pub const FALLBACK_SIMILAR_PACKAGE: &str = "Not disclosed";
pub const FALLBACK_LIFE_AT_COMPANY: &str = "No details available";
pub const FALLBACK_PROFILE_NAME: &str = "Unknown user";

pub fn fallback_skill_name(index: usize) -> String {
    format!("Skill {}", index + 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Freelance,
    Internship,
}

impl EmploymentType {
    pub const ALL: [EmploymentType; 4] = [
        EmploymentType::FullTime,
        EmploymentType::PartTime,
        EmploymentType::Freelance,
        EmploymentType::Internship,
    ];

    /// Identifier the API expects in the `employment_type` parameter.
    pub fn id(self) -> &'static str {
        match self {
            EmploymentType::FullTime => "FULLTIME",
            EmploymentType::PartTime => "PARTTIME",
            EmploymentType::Freelance => "FREELANCE",
            EmploymentType::Internship => "INTERNSHIP",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EmploymentType::FullTime => "Full Time",
            EmploymentType::PartTime => "Part Time",
            EmploymentType::Freelance => "Freelance",
            EmploymentType::Internship => "Internship",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.id().eq_ignore_ascii_case(id.trim()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SalaryRange {
    Lpa10,
    Lpa20,
    Lpa30,
    Lpa40,
}

impl SalaryRange {
    pub const ALL: [SalaryRange; 4] = [
        SalaryRange::Lpa10,
        SalaryRange::Lpa20,
        SalaryRange::Lpa30,
        SalaryRange::Lpa40,
    ];

    /// Minimum annual package, as sent in `minimum_package`.
    pub fn id(self) -> &'static str {
        match self {
            SalaryRange::Lpa10 => "1000000",
            SalaryRange::Lpa20 => "2000000",
            SalaryRange::Lpa30 => "3000000",
            SalaryRange::Lpa40 => "4000000",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SalaryRange::Lpa10 => "10 LPA and above",
            SalaryRange::Lpa20 => "20 LPA and above",
            SalaryRange::Lpa30 => "30 LPA and above",
            SalaryRange::Lpa40 => "40 LPA and above",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.id() == id.trim())
    }

    /// Next floor in the cycle none -> 10 -> 20 -> 30 -> 40 -> none.
    pub fn cycle(current: Option<Self>) -> Option<Self> {
        match current {
            None => Some(SalaryRange::Lpa10),
            Some(SalaryRange::Lpa10) => Some(SalaryRange::Lpa20),
            Some(SalaryRange::Lpa20) => Some(SalaryRange::Lpa30),
            Some(SalaryRange::Lpa30) => Some(SalaryRange::Lpa40),
            Some(SalaryRange::Lpa40) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub image_url: Option<String>,
}

/// A job as shown in the listing and in "similar jobs".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: String,
    pub title: String,
    pub company_logo_url: Option<String>,
    pub employment_type: String,
    pub description: String, // may contain HTML
    pub location: String,
    pub package_per_annum: String,
    pub rating: Option<f64>,
    pub skills: Vec<Skill>,
}

impl JobSummary {
    pub fn description_text(&self) -> String {
        html_to_text(&self.description)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeAtCompany {
    pub description: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDetail {
    #[serde(flatten)]
    pub summary: JobSummary,
    pub apply_link: Option<String>,
    pub life_at_company: LifeAtCompany,
}

/// One job plus its similar jobs, always populated together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDetailPage {
    pub job: JobDetail,
    pub similar_jobs: Vec<JobSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub profile_image_url: Option<String>,
    pub short_bio: String,
}

/// Flatten an HTML fragment to its text, collapsing whitespace.
pub fn html_to_text(fragment: &str) -> String {
    let doc = Html::parse_fragment(fragment);
    let text: String = doc.root_element().text().collect::<Vec<_>>().join(" ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_employment_type_ids() {
        assert_eq!(EmploymentType::from_id("FULLTIME"), Some(EmploymentType::FullTime));
        assert_eq!(EmploymentType::from_id("internship"), Some(EmploymentType::Internship));
        assert_eq!(EmploymentType::from_id("CONTRACT"), None);
        assert_eq!(EmploymentType::PartTime.label(), "Part Time");
    }

    #[test]
    fn test_salary_range_ids() {
        assert_eq!(SalaryRange::from_id("2000000"), Some(SalaryRange::Lpa20));
        assert_eq!(SalaryRange::from_id("2500000"), None);
        assert_eq!(SalaryRange::Lpa40.label(), "40 LPA and above");
    }

    #[test]
    fn test_salary_cycle_wraps_to_none() {
        let mut current = None;
        let mut seen = Vec::new();
        for _ in 0..5 {
            current = SalaryRange::cycle(current);
            seen.push(current);
        }
        assert_eq!(
            seen,
            vec![
                Some(SalaryRange::Lpa10),
                Some(SalaryRange::Lpa20),
                Some(SalaryRange::Lpa30),
                Some(SalaryRange::Lpa40),
                None,
            ]
        );
    }

    #[test]
    fn test_html_to_text() {
        assert_eq!(
            html_to_text("<p>We are <b>hiring</b>\n  engineers.</p><ul><li>Rust</li></ul>"),
            "We are hiring engineers. Rust"
        );
        assert_eq!(html_to_text("plain text"), "plain text");
    }

    #[test]
    fn test_fallback_skill_name_is_one_based() {
        assert_eq!(fallback_skill_name(0), "Skill 1");
        assert_eq!(fallback_skill_name(2), "Skill 3");
    }
}
