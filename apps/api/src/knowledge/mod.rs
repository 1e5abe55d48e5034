//! Static Knowledge Lookup — an immutable in-memory table of industry,
//! position and major metadata used to enrich analysis prompts.
//!
//! Loaded once at startup from a bundled CSV; if the CSV is absent or
//! unreadable the built-in default table keeps the service demoable offline.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::session::Profile;

#[derive(Debug, Clone, Serialize)]
pub struct PositionInfo {
    pub name: String,
    pub skills: String,
    pub education: String,
    pub salary: String,
    pub prospects: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub knowledge_area: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndustryInfo {
    pub overview: String,
    pub positions: Vec<PositionInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MajorInfo {
    pub suitable_industries: Vec<String>,
    pub suitable_positions: Vec<String>,
    pub core_skills: String,
    pub career_paths: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Industry,
    Major,
    Position,
}

impl QueryKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "industry" => Some(QueryKind::Industry),
            "major" => Some(QueryKind::Major),
            "position" => Some(QueryKind::Position),
            _ => None,
        }
    }
}

/// Outcome of a lookup. `NotFound` carries the available keys of the queried
/// kind so callers can render a "did you mean" listing.
#[derive(Debug)]
pub enum QueryOutcome<'a> {
    Industry(&'a IndustryInfo),
    Major {
        name: &'a str,
        info: &'a MajorInfo,
        /// True when the hit came from the substring fallback, not an exact key.
        fuzzy: bool,
    },
    Position {
        industry: &'a str,
        position: &'a PositionInfo,
    },
    NotFound {
        available: Vec<String>,
    },
}

/// One row of the bundled CSV.
#[derive(Debug, Deserialize)]
struct KnowledgeRow {
    industry: String,
    position: String,
    skill_group: String,
    skill_meaning: String,
    knowledge_l1: String,
    knowledge_l2: String,
}

pub struct KnowledgeBase {
    // BTreeMaps so iteration (and therefore the `major` substring fallback)
    // is deterministic in lexicographic key order.
    industries: BTreeMap<String, IndustryInfo>,
    majors: BTreeMap<String, MajorInfo>,
}

impl KnowledgeBase {
    /// Loads the CSV table, falling back to the built-in default table when
    /// the file is missing or malformed.
    pub fn load(csv_path: impl AsRef<Path>) -> Self {
        let path = csv_path.as_ref();
        match Self::load_csv(path) {
            Ok(kb) => {
                info!(
                    "Knowledge base loaded from {}: {} industries, {} majors",
                    path.display(),
                    kb.industries.len(),
                    kb.majors.len()
                );
                kb
            }
            Err(e) => {
                warn!(
                    "Could not load knowledge CSV {}: {e}. Using built-in default table.",
                    path.display()
                );
                Self::default_table()
            }
        }
    }

    fn load_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("opening {}", path.display()))?;

        let mut industries: BTreeMap<String, IndustryInfo> = BTreeMap::new();
        let mut rows: Vec<KnowledgeRow> = Vec::new();

        for record in reader.deserialize() {
            let row: KnowledgeRow = record.context("malformed knowledge CSV row")?;

            let industry = industries
                .entry(row.industry.clone())
                .or_insert_with(|| IndustryInfo {
                    overview: format!(
                        "The {} industry requires a range of professional skills and \
                         offers several career development paths.",
                        row.industry
                    ),
                    positions: Vec::new(),
                });

            match industry
                .positions
                .iter_mut()
                .find(|p| p.name == row.position)
            {
                Some(position) => {
                    // Same position across rows: accumulate distinct skill groups.
                    if !position.skills.contains(&row.skill_group) {
                        position.skills.push_str(", ");
                        position.skills.push_str(&row.skill_group);
                    }
                }
                None => industry.positions.push(PositionInfo {
                    name: row.position.clone(),
                    skills: row.skill_group.clone(),
                    education: "Bachelor's degree or above in a related field".to_string(),
                    salary: "Varies with experience and skill level".to_string(),
                    prospects: "Stable industry demand with good development prospects"
                        .to_string(),
                    skill_description: Some(row.skill_meaning.clone()),
                    knowledge_area: Some(format!("{}: {}", row.knowledge_l1, row.knowledge_l2)),
                }),
            }

            rows.push(row);
        }

        if industries.is_empty() {
            anyhow::bail!("knowledge CSV contained no rows");
        }

        // Majors are derived from the level-1 knowledge areas.
        let mut majors: BTreeMap<String, MajorInfo> = BTreeMap::new();
        for row in &rows {
            let major = majors
                .entry(row.knowledge_l1.clone())
                .or_insert_with(|| MajorInfo {
                    suitable_industries: Vec::new(),
                    suitable_positions: Vec::new(),
                    core_skills: String::new(),
                    career_paths: String::new(),
                });
            push_unique(&mut major.suitable_industries, &row.industry);
            push_unique(&mut major.suitable_positions, &row.position);
            if !major.core_skills.contains(&row.skill_group) {
                if !major.core_skills.is_empty() {
                    major.core_skills.push_str(", ");
                }
                major.core_skills.push_str(&row.skill_group);
            }
        }
        for major in majors.values_mut() {
            let sample: Vec<&str> = major
                .suitable_positions
                .iter()
                .take(3)
                .map(String::as_str)
                .collect();
            major.career_paths = format!(
                "Can progress from entry-level to senior roles such as {}",
                sample.join(", ")
            );
        }

        Ok(KnowledgeBase { industries, majors })
    }

    /// Built-in table covering two industries and two majors so the service
    /// works with no CSV on disk.
    pub fn default_table() -> Self {
        let mut industries = BTreeMap::new();
        industries.insert(
            "IT/Internet".to_string(),
            IndustryInfo {
                overview: "The IT/Internet industry has fast technology updates and fierce \
                           competition, but offers high salary levels and development space"
                    .to_string(),
                positions: vec![
                    position(
                        "Software Engineer",
                        "Python, Java, JavaScript, Data Structures, Algorithms",
                        "Bachelor's degree or above in Computer Science/Software Engineering",
                        "$80K-$150K",
                        "Continuous industry demand, broad development space",
                    ),
                    position(
                        "Frontend Developer",
                        "HTML, CSS, JavaScript, React/Vue/Angular, TypeScript",
                        "Bachelor's degree or above in Computer Science related majors",
                        "$70K-$130K",
                        "High demand with continuous internet product development",
                    ),
                    position(
                        "Data Analyst",
                        "SQL, Python, R, Excel, Data Visualization, Statistics",
                        "Bachelor's degree or above in Statistics/Mathematics/Computer Science",
                        "$75K-$140K",
                        "Scarce talent in the big data era, good development prospects",
                    ),
                ],
            },
        );
        industries.insert(
            "Finance".to_string(),
            IndustryInfo {
                overview: "The financial industry is relatively stable, emphasizing \
                           professionalism and compliance, with a mature career development \
                           system"
                    .to_string(),
                positions: vec![
                    position(
                        "Investment Analyst",
                        "Financial Analysis, Valuation Models, Excel, Financial Market Knowledge",
                        "Bachelor's degree or above in Finance/Economics/Accounting",
                        "$85K-$150K",
                        "Stable financial industry with clear promotion paths",
                    ),
                    position(
                        "Risk Control",
                        "Risk Assessment, Data Analysis, Regulatory Knowledge, Financial Instruments",
                        "Bachelor's degree or above in Finance/Mathematics/Statistics",
                        "$90K-$160K",
                        "Stable demand for risk control talent, good career development prospects",
                    ),
                ],
            },
        );

        let mut majors = BTreeMap::new();
        majors.insert(
            "Computer Science".to_string(),
            MajorInfo {
                suitable_industries: vec![
                    "IT/Internet".to_string(),
                    "Finance".to_string(),
                    "Education".to_string(),
                ],
                suitable_positions: vec![
                    "Software Engineer".to_string(),
                    "Data Analyst".to_string(),
                    "IT Consultant".to_string(),
                ],
                core_skills: "Programming Languages, Data Structures, Algorithms, Databases, \
                              Network Fundamentals"
                    .to_string(),
                career_paths: "Can develop from Developer to Architect, Technical Manager, or \
                               Product Manager"
                    .to_string(),
            },
        );
        majors.insert(
            "Finance".to_string(),
            MajorInfo {
                suitable_industries: vec![
                    "Finance".to_string(),
                    "Consulting".to_string(),
                    "Corporate Finance".to_string(),
                ],
                suitable_positions: vec![
                    "Investment Analyst".to_string(),
                    "Risk Control".to_string(),
                    "Financial Advisor".to_string(),
                ],
                core_skills: "Financial Analysis, Financial Markets, Risk Management, \
                              Investment Theory"
                    .to_string(),
                career_paths: "Can develop from Analyst to Investment Manager, Risk Manager, \
                               or CFO"
                    .to_string(),
            },
        );

        KnowledgeBase { industries, majors }
    }

    pub fn query(&self, kind: QueryKind, key: &str) -> QueryOutcome<'_> {
        match kind {
            QueryKind::Industry => match self.industries.get(key) {
                Some(info) => QueryOutcome::Industry(info),
                None => QueryOutcome::NotFound {
                    available: self.industries.keys().cloned().collect(),
                },
            },
            QueryKind::Major => {
                if let Some((name, info)) = self.majors.get_key_value(key) {
                    return QueryOutcome::Major {
                        name,
                        info,
                        fuzzy: false,
                    };
                }
                // Bidirectional substring fallback, first hit in key order.
                for (name, info) in &self.majors {
                    if key.contains(name.as_str()) || name.contains(key) {
                        return QueryOutcome::Major {
                            name,
                            info,
                            fuzzy: true,
                        };
                    }
                }
                QueryOutcome::NotFound {
                    available: self.majors.keys().cloned().collect(),
                }
            }
            QueryKind::Position => {
                for (industry, info) in &self.industries {
                    if let Some(position) = info.positions.iter().find(|p| p.name == key) {
                        return QueryOutcome::Position { industry, position };
                    }
                }
                QueryOutcome::NotFound {
                    available: self
                        .industries
                        .values()
                        .flat_map(|i| i.positions.iter().map(|p| p.name.clone()))
                        .collect(),
                }
            }
        }
    }

    /// Renders the knowledge context block for a user profile, embedded into
    /// stage-1 prompts. Every branch produces text — even a miss becomes a
    /// listing of what the table does know.
    pub fn context_for(&self, profile: &Profile) -> String {
        let mut results: Vec<String> = Vec::new();

        if !profile.target_industry.is_empty() {
            self.describe_industry(profile, &mut results);
        }

        if !profile.major.is_empty() {
            self.describe_major(&profile.major, &mut results);
        }

        if !profile.target_position.is_empty() && profile.target_industry.is_empty() {
            self.describe_position(&profile.target_position, &mut results);
        }

        if results.is_empty() {
            results.push("No directly matching information was found in the knowledge base.".to_string());
            results.push(format!(
                "Available industries:\n{}",
                bullet_list(self.industries.keys())
            ));
            results.push(format!(
                "Available knowledge areas:\n{}",
                bullet_list(self.majors.keys())
            ));
        }

        results.join("\n\n")
    }

    fn describe_industry(&self, profile: &Profile, results: &mut Vec<String>) {
        let industry_name = &profile.target_industry;
        let info = match self.industries.get(industry_name) {
            Some(info) => info,
            None => {
                results.push(format!(
                    "No information found for industry '{industry_name}'. Available industries:\n{}",
                    bullet_list(self.industries.keys())
                ));
                return;
            }
        };

        results.push(format!(
            "Industry overview - {industry_name}:\n{}",
            info.overview
        ));

        if profile.target_position.is_empty() {
            let listing: Vec<String> = info
                .positions
                .iter()
                .map(|p| format!("- {}: required skills ({}), {}", p.name, p.skills, p.prospects))
                .collect();
            results.push(format!(
                "Popular positions in the {industry_name} industry:\n{}",
                listing.join("\n")
            ));
            return;
        }

        match info
            .positions
            .iter()
            .find(|p| p.name == profile.target_position)
        {
            Some(p) => results.push(format_position_detail(p, None)),
            None => {
                results.push(format!(
                    "No detailed information found for the position '{}' in the {industry_name} \
                     industry.",
                    profile.target_position
                ));
                let listing: Vec<String> = info
                    .positions
                    .iter()
                    .map(|p| format!("- {}: {}", p.name, p.skills))
                    .collect();
                results.push(format!(
                    "Other positions in the {industry_name} industry:\n{}",
                    listing.join("\n")
                ));
            }
        }
    }

    fn describe_major(&self, major: &str, results: &mut Vec<String>) {
        match self.query(QueryKind::Major, major) {
            QueryOutcome::Major {
                name,
                info,
                fuzzy: false,
            } => results.push(format_major_detail(name, info, false)),
            QueryOutcome::Major {
                name,
                info,
                fuzzy: true,
            } => results.push(format_major_detail(name, info, true)),
            _ => {
                results.push(format!(
                    "No information directly related to the '{major}' major was found. \
                     Consider these knowledge areas:\n{}",
                    bullet_list(self.majors.keys().take(5))
                ));
            }
        }
    }

    fn describe_position(&self, position_name: &str, results: &mut Vec<String>) {
        match self.query(QueryKind::Position, position_name) {
            QueryOutcome::Position { industry, position } => {
                results.push(format_position_detail(position, Some(industry)));
            }
            _ => {
                results.push(format!(
                    "No detailed information found for the position '{position_name}'."
                ));
                // Bidirectional substring scan for related positions.
                let similar: Vec<String> = self
                    .industries
                    .iter()
                    .flat_map(|(industry, info)| {
                        info.positions
                            .iter()
                            .filter(|p| {
                                p.name.contains(position_name) || position_name.contains(&p.name)
                            })
                            .map(move |p| format!("- {} (in the {industry} industry)", p.name))
                    })
                    .collect();
                if !similar.is_empty() {
                    results.push(format!("Possibly related positions:\n{}", similar.join("\n")));
                }
            }
        }
    }
}

fn position(
    name: &str,
    skills: &str,
    education: &str,
    salary: &str,
    prospects: &str,
) -> PositionInfo {
    PositionInfo {
        name: name.to_string(),
        skills: skills.to_string(),
        education: education.to_string(),
        salary: salary.to_string(),
        prospects: prospects.to_string(),
        skill_description: None,
        knowledge_area: None,
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

fn bullet_list<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|i| format!("- {}", i.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_position_detail(p: &PositionInfo, industry: Option<&str>) -> String {
    let heading = match industry {
        Some(industry) => format!("Position detail - {} (in the {industry} industry):", p.name),
        None => format!("Position detail - {}:", p.name),
    };
    let mut lines = vec![
        heading,
        format!("Required skills: {}", p.skills),
        format!("Education requirement: {}", p.education),
        format!("Salary range: {}", p.salary),
        format!("Career prospects: {}", p.prospects),
    ];
    if let Some(desc) = &p.skill_description {
        lines.insert(2, format!("Skill description: {desc}"));
    }
    if let Some(area) = &p.knowledge_area {
        lines.insert(2, format!("Related knowledge area: {area}"));
    }
    lines.join("\n")
}

fn format_major_detail(name: &str, info: &MajorInfo, fuzzy: bool) -> String {
    let heading = if fuzzy {
        format!("No exact major match; closest related area is {name}:")
    } else {
        format!("Career directions for the {name} major:")
    };
    format!(
        "{heading}\nSuitable industries: {}\nSuitable positions: {}\nCore skills: {}\nCareer paths: {}",
        info.suitable_industries.join(", "),
        info.suitable_positions.join(", "),
        info.core_skills,
        info.career_paths
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn profile(major: &str, industry: &str, position: &str) -> Profile {
        Profile {
            university: "Test University".to_string(),
            major: major.to_string(),
            target_industry: industry.to_string(),
            target_position: position.to_string(),
        }
    }

    #[test]
    fn default_it_internet_industry_has_positions() {
        let kb = KnowledgeBase::default_table();
        match kb.query(QueryKind::Industry, "IT/Internet") {
            QueryOutcome::Industry(info) => assert!(!info.positions.is_empty()),
            other => panic!("expected Industry, got {other:?}"),
        }
    }

    #[test]
    fn exact_major_match_returns_record() {
        let kb = KnowledgeBase::default_table();
        match kb.query(QueryKind::Major, "Computer Science") {
            QueryOutcome::Major { name, info, fuzzy } => {
                assert_eq!(name, "Computer Science");
                assert!(!fuzzy);
                assert!(info.suitable_industries.contains(&"IT/Internet".to_string()));
            }
            other => panic!("expected Major, got {other:?}"),
        }
    }

    #[test]
    fn major_substring_fallback_matches_both_directions() {
        let kb = KnowledgeBase::default_table();
        // Query contains a known key.
        match kb.query(QueryKind::Major, "Applied Computer Science Theory") {
            QueryOutcome::Major { name, fuzzy, .. } => {
                assert_eq!(name, "Computer Science");
                assert!(fuzzy);
            }
            other => panic!("expected fuzzy Major, got {other:?}"),
        }
        // Known key contains the query.
        match kb.query(QueryKind::Major, "Computer") {
            QueryOutcome::Major { name, fuzzy, .. } => {
                assert_eq!(name, "Computer Science");
                assert!(fuzzy);
            }
            other => panic!("expected fuzzy Major, got {other:?}"),
        }
    }

    #[test]
    fn unmatched_major_lists_available_keys() {
        let kb = KnowledgeBase::default_table();
        match kb.query(QueryKind::Major, "Astrobiology") {
            QueryOutcome::NotFound { available } => {
                assert_eq!(available, vec!["Computer Science", "Finance"]);
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn position_is_found_across_industries() {
        let kb = KnowledgeBase::default_table();
        match kb.query(QueryKind::Position, "Risk Control") {
            QueryOutcome::Position { industry, position } => {
                assert_eq!(industry, "Finance");
                assert_eq!(position.name, "Risk Control");
            }
            other => panic!("expected Position, got {other:?}"),
        }
    }

    #[test]
    fn context_contains_industry_overview_and_major_directions() {
        let kb = KnowledgeBase::default_table();
        let ctx = kb.context_for(&profile("Computer Science", "IT/Internet", "Data Analyst"));
        assert!(ctx.contains("Industry overview - IT/Internet"));
        assert!(ctx.contains("Position detail - Data Analyst"));
        assert!(ctx.contains("Career directions for the Computer Science major"));
    }

    #[test]
    fn context_for_unknown_everything_lists_table_contents() {
        let kb = KnowledgeBase::default_table();
        let ctx = kb.context_for(&profile("", "", ""));
        assert!(ctx.contains("Available industries"));
        assert!(ctx.contains("- IT/Internet"));
        assert!(ctx.contains("- Computer Science"));
    }

    #[test]
    fn unknown_position_without_industry_suggests_similar() {
        let kb = KnowledgeBase::default_table();
        let ctx = kb.context_for(&profile("", "", "Analyst"));
        assert!(ctx.contains("No detailed information found"));
        assert!(ctx.contains("Possibly related positions"));
        assert!(ctx.contains("Investment Analyst"));
    }

    #[test]
    fn csv_rows_aggregate_skills_per_position() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "industry,position,skill_group,skill_meaning,knowledge_l1,knowledge_l2"
        )
        .unwrap();
        writeln!(
            file,
            "IT/Internet,Backend Engineer,Rust,Systems language,Computer Science,Compilers"
        )
        .unwrap();
        writeln!(
            file,
            "IT/Internet,Backend Engineer,SQL,Query language,Computer Science,Databases"
        )
        .unwrap();

        let kb = KnowledgeBase::load(file.path());
        match kb.query(QueryKind::Position, "Backend Engineer") {
            QueryOutcome::Position { position, .. } => {
                assert_eq!(position.skills, "Rust, SQL");
            }
            other => panic!("expected Position, got {other:?}"),
        }
        match kb.query(QueryKind::Major, "Computer Science") {
            QueryOutcome::Major { info, .. } => {
                assert_eq!(info.suitable_positions, vec!["Backend Engineer"]);
            }
            other => panic!("expected Major, got {other:?}"),
        }
    }

    #[test]
    fn bundled_csv_at_the_repo_root_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../knowledge.csv");
        let kb = KnowledgeBase::load(path);
        // Quantitative Researcher only exists in the CSV, so a hit here
        // proves the file was read rather than the default table.
        match kb.query(QueryKind::Position, "Quantitative Researcher") {
            QueryOutcome::Position { industry, position } => {
                assert_eq!(industry, "Finance");
                assert!(position.skills.contains("Statistical Modeling"));
            }
            other => panic!("expected Position, got {other:?}"),
        }
        match kb.query(QueryKind::Major, "Statistics") {
            QueryOutcome::Major { info, fuzzy, .. } => {
                assert!(!fuzzy);
                assert!(info.suitable_positions.contains(&"Data Analyst".to_string()));
            }
            other => panic!("expected Major, got {other:?}"),
        }
    }

    #[test]
    fn missing_csv_falls_back_to_default_table() {
        let kb = KnowledgeBase::load("/nonexistent/knowledge.csv");
        assert!(matches!(
            kb.query(QueryKind::Industry, "Finance"),
            QueryOutcome::Industry(_)
        ));
    }
}
