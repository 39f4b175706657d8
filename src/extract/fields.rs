//! Heuristic field extraction from resume text.
//!
//! Pure and deterministic: identical input text always yields identical
//! fields, and the four extractions are independent of each other.
//! Every field is an ordered cascade of matchers; the first hit wins and
//! a miss simply leaves the field unset. Partial success is normal.

use once_cell::sync::Lazy;
use regex::Regex;

/// Tunable extraction parameters. The birth-year window is empirical,
/// not a specification of correctness.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub dob_year_min: i32,
    pub dob_year_max: i32,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            dob_year_min: 1940,
            dob_year_max: 2005,
        }
    }
}

/// Candidate fields recovered from free text. All independent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeFields {
    pub name: Option<String>,
    pub email: Option<String>,
    pub contact_number: Option<String>,
    pub date_of_birth: Option<String>,
}

// Compiled once, reused.
static NAME_LABEL_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?im)^\s*name\s*:\s*([^\r\n]+)").unwrap(),
        Regex::new(r"(?im)^\s*full\s*name\s*:\s*([^\r\n]+)").unwrap(),
        Regex::new(r"(?i)name\s*:\s*([A-Za-z\s]+)").unwrap(),
        Regex::new(r"(?i)full\s*name\s*:\s*([A-Za-z\s]+)").unwrap(),
    ]
});
static CAPS_RUN_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Z]{3,})([A-Z]{3,})$").unwrap());
static ALL_CAPS_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z\s]+$").unwrap());
static LETTERS_AND_SPACES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z\s]+$").unwrap());
static LETTERS_ONLY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z]+$").unwrap());
static TITLE_CASE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([A-Z][a-z]+\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)").unwrap());

static EMAIL_BARE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}\b").unwrap());
static EMAIL_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        EMAIL_BARE_RE.clone(),
        Regex::new(r"(?i)email\s*:\s*[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap(),
        Regex::new(r"(?i)e-mail\s*:\s*[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap(),
        Regex::new(r"(?i)mail\s*:\s*[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap(),
    ]
});
static EMAIL_ADDR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap());

static PHONE_LABELED_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)(?:phone|mobile|contact|tel|telephone|cell)\s*:?\s*[+\d\s\-()]+")
            .unwrap(),
        Regex::new(
            r"(?i)(?:phone|mobile|contact|tel|telephone|cell)\s*:?\s*\+?\d{1,4}[-.\s]?\(?\d{1,4}\)?[-.\s]?\d{1,4}[-.\s]?\d{1,9}",
        )
        .unwrap(),
    ]
});
static PHONE_STANDALONE_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"\+?\d{1,4}[-.\s]?\(?\d{1,4}\)?[-.\s]?\d{1,4}[-.\s]?\d{1,9}").unwrap(),
        Regex::new(r"\b\d{10,15}\b").unwrap(),
    ]
});

static DOB_LABEL_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(
            r"(?i)(?:date\s*of\s*birth|dob|d\.o\.b\.|birth\s*date|born)\s*:?\s*([0-9]{1,2}[/\-.][0-9]{1,2}[/\-.][0-9]{2,4})",
        )
        .unwrap(),
        Regex::new(
            r"(?i)(?:date\s*of\s*birth|dob|d\.o\.b\.|birth\s*date|born)\s*:?\s*([A-Za-z]+\s+\d{1,2},?\s+\d{4})",
        )
        .unwrap(),
        Regex::new(r"(?i)(?:born|birth)\s*:?\s*([0-9]{1,2}[/\-.][0-9]{1,2}[/\-.][0-9]{2,4})")
            .unwrap(),
    ]
});
static NUMERIC_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})[/\-.](\d{1,2})[/\-.](\d{4})\b").unwrap());

/// Extract candidate fields from resolved document text.
pub fn extract_resume_fields(text: &str, opts: &ExtractOptions) -> ResumeFields {
    if text.is_empty() {
        return ResumeFields::default();
    }

    let lines: Vec<&str> = text
        .split(['\n', '\r'])
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    ResumeFields {
        name: extract_name(text, &lines),
        email: extract_email(text),
        contact_number: extract_contact_number(text),
        date_of_birth: extract_date_of_birth(text, opts),
    }
}

fn extract_name(text: &str, lines: &[&str]) -> Option<String> {
    name_from_label(text)
        .or_else(|| name_from_first_caps_line(lines))
        .or_else(|| name_from_spaced_caps_line(lines))
        .or_else(|| name_from_capitalized_words(lines))
        .or_else(|| name_from_title_case(text))
}

/// Strategy 1: explicit "Name:" / "Full Name:" label lines.
fn name_from_label(text: &str) -> Option<String> {
    for re in NAME_LABEL_RES.iter() {
        if let Some(caps) = re.captures(text) {
            let name = caps.get(1)?.as_str().trim();
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
    }
    None
}

/// Strategy 2: all-caps first line of length 6-29. A single glued run
/// like "DANISHALI" is split into two capital runs of 3+ letters.
fn name_from_first_caps_line(lines: &[&str]) -> Option<String> {
    let first = *lines.first()?;
    let squeezed: String = first.chars().filter(|c| !c.is_whitespace()).collect();
    if squeezed.is_empty() || !squeezed.chars().all(|c| c.is_ascii_uppercase()) {
        return None;
    }
    if first.len() <= 5 || first.len() >= 30 {
        return None;
    }
    if let Some(caps) = CAPS_RUN_SPLIT_RE.captures(first) {
        return Some(format!("{} {}", &caps[1], &caps[2]));
    }
    Some(first.to_string())
}

/// Strategy 3: an all-caps line with 2-4 words in the first five lines.
fn name_from_spaced_caps_line(lines: &[&str]) -> Option<String> {
    for line in lines.iter().take(5) {
        if line.len() > 5 && line.len() < 50 && ALL_CAPS_LINE_RE.is_match(line) {
            let words = line.split_whitespace().count();
            if (2..=4).contains(&words) {
                return Some(line.to_string());
            }
        }
    }
    None
}

/// Strategy 4: a line of 2-4 capitalized letter-only words in the first
/// ten lines.
fn name_from_capitalized_words(lines: &[&str]) -> Option<String> {
    for line in lines.iter().take(10) {
        if !LETTERS_AND_SPACES_RE.is_match(line) {
            continue;
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        if !(2..=4).contains(&words.len()) {
            continue;
        }
        let all_capitalized = words.iter().all(|w| {
            w.chars().next().is_some_and(|c| c.is_ascii_uppercase()) && LETTERS_ONLY_RE.is_match(w)
        });
        if all_capitalized {
            return Some(line.to_string());
        }
    }
    None
}

/// Strategy 5: first "Firstname Lastname" title-case pattern anywhere.
fn name_from_title_case(text: &str) -> Option<String> {
    TITLE_CASE_NAME_RE
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
}

fn extract_email(text: &str) -> Option<String> {
    for re in EMAIL_RES.iter() {
        for m in re.find_iter(text) {
            if let Some(addr) = EMAIL_ADDR_RE.find(m.as_str()) {
                return Some(addr.as_str().to_lowercase());
            }
        }
    }
    None
}

fn extract_contact_number(text: &str) -> Option<String> {
    // Labeled numbers first; a cleaned digit run of 10+ is accepted.
    for re in PHONE_LABELED_RES.iter() {
        for m in re.find_iter(text) {
            let cleaned = keep_digits_and_plus(m.as_str());
            if cleaned.len() >= 10 {
                return Some(cleaned);
            }
        }
    }
    // Fallback: standalone sequences shaped like phone numbers.
    for re in PHONE_STANDALONE_RES.iter() {
        for m in re.find_iter(text) {
            let cleaned = keep_digits_and_plus(m.as_str());
            if (10..=15).contains(&cleaned.len()) {
                return Some(cleaned);
            }
        }
    }
    None
}

fn keep_digits_and_plus(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect()
}

fn extract_date_of_birth(text: &str, opts: &ExtractOptions) -> Option<String> {
    for re in DOB_LABEL_RES.iter() {
        if let Some(caps) = re.captures(text) {
            let date = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
            if !date.is_empty() {
                return Some(date.to_string());
            }
        }
    }
    // Fallback: any D/M/Y date with a plausible birth year.
    for caps in NUMERIC_DATE_RE.captures_iter(text) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        if (1..=31).contains(&day)
            && (1..=12).contains(&month)
            && (opts.dob_year_min..=opts.dob_year_max).contains(&year)
        {
            return Some(caps[0].trim().to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(text: &str) -> ResumeFields {
        extract_resume_fields(text, &ExtractOptions::default())
    }

    #[test]
    fn label_strategy_short_circuits() {
        let fields = extract("Name: Jane Doe\nJOHN SMITH\njane@example.com");
        assert_eq!(fields.name.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn glued_caps_first_line_is_split() {
        let fields = extract("DANISHALI\nSoftware Engineer");
        assert_eq!(fields.name.as_deref(), Some("DANISH ALI"));
    }

    #[test]
    fn caps_first_line_with_space_kept_whole() {
        let fields = extract("DANISH ALI\nSoftware Engineer");
        assert_eq!(fields.name.as_deref(), Some("DANISH ALI"));
    }

    #[test]
    fn spaced_caps_line_within_first_five() {
        let fields = extract("resume\nprofile\nJOHN ALBERT SMITH\nexperience");
        assert_eq!(fields.name.as_deref(), Some("JOHN ALBERT SMITH"));
    }

    #[test]
    fn title_case_line_found() {
        let fields = extract("curriculum vitae\nMary Watson, Senior Developer\n2019");
        assert_eq!(fields.name.as_deref(), Some("Mary Watson"));
    }

    #[test]
    fn missing_name_is_none_not_error() {
        let fields = extract("objective: seeking a role\n12345");
        assert_eq!(fields.name, None);
    }

    #[test]
    fn email_is_lowercased() {
        let fields = extract("reach me at Jane.Doe@Example.COM please");
        assert_eq!(fields.email.as_deref(), Some("jane.doe@example.com"));
    }

    #[test]
    fn labeled_email_extracted_from_label_line() {
        let fields = extract("E-Mail: someone@test.org");
        assert_eq!(fields.email.as_deref(), Some("someone@test.org"));
    }

    #[test]
    fn labeled_phone_preferred_and_cleaned() {
        let fields = extract("Phone: +92 300-123-4567");
        assert_eq!(fields.contact_number.as_deref(), Some("+923001234567"));
    }

    #[test]
    fn short_digit_runs_rejected() {
        let fields = extract("Room 404, floor 3");
        assert_eq!(fields.contact_number, None);
    }

    #[test]
    fn standalone_digit_run_accepted() {
        let fields = extract("call 03001234567 anytime");
        assert_eq!(fields.contact_number.as_deref(), Some("03001234567"));
    }

    #[test]
    fn labeled_dob_found() {
        let fields = extract("Date of Birth: 14/03/1992");
        assert_eq!(fields.date_of_birth.as_deref(), Some("14/03/1992"));
    }

    #[test]
    fn dob_month_name_format() {
        let fields = extract("DOB: March 14, 1992");
        assert_eq!(fields.date_of_birth.as_deref(), Some("March 14, 1992"));
    }

    #[test]
    fn dob_fallback_honors_year_window() {
        assert_eq!(
            extract("joined 12/01/1995 as intern").date_of_birth.as_deref(),
            Some("12/01/1995")
        );
        // Outside [1940, 2005]: not a plausible birth date.
        assert_eq!(extract("joined 12/01/2015 as intern").date_of_birth, None);
    }

    #[test]
    fn extraction_is_deterministic_and_independent() {
        let text = "JANE DOE\njane@example.com\nPhone: 0300 1234567\nDOB: 1/2/1990";
        let a = extract(text);
        let b = extract(text);
        assert_eq!(a, b);
        assert!(a.name.is_some() && a.email.is_some());
        assert!(a.contact_number.is_some() && a.date_of_birth.is_some());
    }

    #[test]
    fn empty_text_yields_empty_fields() {
        assert_eq!(extract(""), ResumeFields::default());
    }
}
