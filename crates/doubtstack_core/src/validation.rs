//! crates/doubtstack_core/src/validation.rs
//!
//! Input rules for everything a client can submit. Each validator either returns
//! the cleaned-up value or every field error it found.

use crate::domain::{
    DoubtUpdate, NewTag, PageRequest, ProfileUpdate, Role, TagCategory, VoteKind,
};
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\S+@\S+\.\S+$").expect("valid email regex"));

pub const MAX_NAME_LEN: usize = 50;
pub const MAX_BIO_LEN: usize = 200;
pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_BODY_LEN: usize = 5000;
pub const MAX_TAG_DESCRIPTION_LEN: usize = 200;
pub const MAX_PAGE_LIMIT: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// All field errors collected while validating one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[error("validation failed on {} field(s)", .0.len())]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn single(field: &str, message: &str) -> Self {
        let mut errors = Self::default();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: &str, message: &str) {
        self.0.push(FieldError {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn finish<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

/// Trims the given tags and drops empty ones.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Splits a comma-separated tag string.
pub fn split_tags(raw: &str) -> Vec<String> {
    normalize_tags(raw.split(','))
}

//=========================================================================================
// Accounts
//=========================================================================================

#[derive(Debug, Clone, Default)]
pub struct RegistrationInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub branch: Option<String>,
    pub department: Option<String>,
    pub semester: Option<i32>,
}

/// A registration that passed validation. The password is still plaintext.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub branch: Option<String>,
    pub department: String,
    pub semester: Option<i32>,
}

pub fn validate_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn validate_registration(input: RegistrationInput) -> Result<Registration, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let name = trimmed(input.name).unwrap_or_default();
    if name.is_empty() {
        errors.push("name", "Name is required");
    } else if char_len(&name) > MAX_NAME_LEN {
        errors.push("name", "Name cannot be more than 50 characters");
    }

    let email = input.email.unwrap_or_default().trim().to_lowercase();
    if !validate_email(&email) {
        errors.push("email", "Valid email is required");
    }

    let password = input.password.unwrap_or_default();
    if char_len(&password) < MIN_PASSWORD_LEN {
        errors.push("password", "Password must be at least 6 characters");
    }

    let role = match input.role.as_deref().map(str::parse::<Role>) {
        Some(Ok(role)) => Some(role),
        _ => {
            errors.push("role", "Invalid role");
            None
        }
    };

    let department = trimmed(input.department).unwrap_or_default();
    if department.is_empty() {
        errors.push("department", "Department is required");
    }

    let branch = trimmed(input.branch).filter(|b| !b.is_empty());
    if let Some(semester) = input.semester {
        if !(1..=8).contains(&semester) {
            errors.push("semester", "Semester must be between 1 and 8");
        }
    }
    if role == Some(Role::Student) {
        if branch.is_none() {
            errors.push("branch", "Branch is required for students");
        }
        if input.semester.is_none() {
            errors.push("semester", "Semester is required for students");
        }
    }

    errors.finish(())?;
    Ok(Registration {
        name,
        email,
        password,
        role: role.unwrap_or(Role::Student),
        branch,
        department,
        semester: input.semester,
    })
}

/// Returns the normalized (lowercase) email.
pub fn validate_login(email: &str, password: &str) -> Result<String, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let email = email.trim().to_lowercase();
    if !validate_email(&email) {
        errors.push("email", "Valid email is required");
    }
    if password.is_empty() {
        errors.push("password", "Password is required");
    }
    errors.finish(email)
}

pub fn validate_new_password(password: &str) -> Result<(), ValidationErrors> {
    if char_len(password) < MIN_PASSWORD_LEN {
        return Err(ValidationErrors::single(
            "newPassword",
            "Password must be at least 6 characters",
        ));
    }
    Ok(())
}

pub fn validate_profile_update(update: ProfileUpdate) -> Result<ProfileUpdate, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let name = trimmed(update.name);
    if let Some(name) = &name {
        if name.is_empty() {
            errors.push("name", "Name cannot be empty");
        } else if char_len(name) > MAX_NAME_LEN {
            errors.push("name", "Name cannot be more than 50 characters");
        }
    }
    if let Some(bio) = &update.bio {
        if char_len(bio) > MAX_BIO_LEN {
            errors.push("bio", "Bio cannot be more than 200 characters");
        }
    }
    if let Some(semester) = update.semester {
        if !(1..=8).contains(&semester) {
            errors.push("semester", "Semester must be between 1 and 8");
        }
    }
    errors.finish(ProfileUpdate {
        name,
        branch: trimmed(update.branch),
        ..update
    })
}

//=========================================================================================
// Doubts and answers
//=========================================================================================

#[derive(Debug, Clone, Default)]
pub struct DoubtInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub tags: Vec<String>,
    pub is_urgent: bool,
}

/// A doubt that passed validation; the department is taken from the author later.
#[derive(Debug, Clone)]
pub struct DoubtDraft {
    pub title: String,
    pub description: String,
    pub subject: String,
    pub tags: Vec<String>,
    pub is_urgent: bool,
}

pub fn validate_new_doubt(input: DoubtInput) -> Result<DoubtDraft, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let title = trimmed(input.title).unwrap_or_default();
    if title.is_empty() {
        errors.push("title", "Title is required");
    } else if char_len(&title) > MAX_TITLE_LEN {
        errors.push("title", "Title cannot exceed 200 characters");
    }

    let description = trimmed(input.description).unwrap_or_default();
    if description.is_empty() {
        errors.push("description", "Description is required");
    } else if char_len(&description) > MAX_BODY_LEN {
        errors.push("description", "Description cannot exceed 5000 characters");
    }

    let subject = trimmed(input.subject).unwrap_or_default();
    if subject.is_empty() {
        errors.push("subject", "Subject is required");
    }

    errors.finish(DoubtDraft {
        title,
        description,
        subject,
        tags: normalize_tags(input.tags),
        is_urgent: input.is_urgent,
    })
}

pub fn validate_doubt_update(update: DoubtUpdate) -> Result<DoubtUpdate, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let title = trimmed(update.title);
    if let Some(title) = &title {
        if title.is_empty() {
            errors.push("title", "Title cannot be empty");
        } else if char_len(title) > MAX_TITLE_LEN {
            errors.push("title", "Title cannot exceed 200 characters");
        }
    }
    let description = trimmed(update.description);
    if let Some(description) = &description {
        if description.is_empty() {
            errors.push("description", "Description cannot be empty");
        } else if char_len(description) > MAX_BODY_LEN {
            errors.push("description", "Description cannot exceed 5000 characters");
        }
    }
    let subject = trimmed(update.subject);
    if let Some(subject) = &subject {
        if subject.is_empty() {
            errors.push("subject", "Subject cannot be empty");
        }
    }

    errors.finish(DoubtUpdate {
        title,
        description,
        subject,
        tags: update.tags.map(normalize_tags),
        is_urgent: update.is_urgent,
    })
}

pub fn validate_answer_content(content: Option<String>) -> Result<String, ValidationErrors> {
    let content = trimmed(content).unwrap_or_default();
    if content.is_empty() {
        return Err(ValidationErrors::single("content", "Answer content is required"));
    }
    if char_len(&content) > MAX_BODY_LEN {
        return Err(ValidationErrors::single(
            "content",
            "Answer cannot exceed 5000 characters",
        ));
    }
    Ok(content)
}

pub fn validate_vote(vote_type: Option<&str>) -> Result<VoteKind, ValidationErrors> {
    vote_type
        .and_then(|v| v.parse::<VoteKind>().ok())
        .ok_or_else(|| {
            ValidationErrors::single("voteType", "Vote type must be upvote or downvote")
        })
}

/// Interprets the loose truthy forms a form submission may carry.
pub fn is_truthy(value: &str) -> bool {
    matches!(value, "true" | "on")
}

//=========================================================================================
// Tags
//=========================================================================================

#[derive(Debug, Clone, Default)]
pub struct TagInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub related_tags: Vec<String>,
}

pub fn validate_new_tag(input: TagInput) -> Result<NewTag, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let name = input.name.unwrap_or_default().trim().to_lowercase();
    if name.is_empty() {
        errors.push("name", "Tag name is required");
    }
    if let Some(description) = &input.description {
        if char_len(description) > MAX_TAG_DESCRIPTION_LEN {
            errors.push("description", "Description cannot exceed 200 characters");
        }
    }
    let category = match input.category.as_deref() {
        None => TagCategory::General,
        Some(raw) => raw.parse::<TagCategory>().unwrap_or_else(|_| {
            errors.push("category", "Invalid tag category");
            TagCategory::General
        }),
    };

    errors.finish(NewTag {
        name,
        description: input.description,
        category,
        related_tags: normalize_tags(input.related_tags),
    })
}

//=========================================================================================
// Pagination
//=========================================================================================

pub fn page_request(
    page: Option<i64>,
    limit: Option<i64>,
    default_limit: i64,
) -> Result<PageRequest, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let page = page.unwrap_or(1);
    if page < 1 {
        errors.push("page", "Page must be at least 1");
    }
    let limit = limit.unwrap_or(default_limit);
    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        errors.push("limit", "Limit must be between 1 and 100");
    }
    errors.finish(PageRequest { page, limit })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student() -> RegistrationInput {
        RegistrationInput {
            name: Some("  Asha  ".into()),
            email: Some("Asha@Campus.EDU".into()),
            password: Some("secret1".into()),
            role: Some("student".into()),
            branch: Some("CSE".into()),
            department: Some("Computer Science".into()),
            semester: Some(3),
        }
    }

    fn fields(errors: &ValidationErrors) -> Vec<&str> {
        errors.0.iter().map(|e| e.field.as_str()).collect()
    }

    #[test]
    fn registration_normalizes_name_and_email() {
        let reg = validate_registration(student()).unwrap();
        assert_eq!(reg.name, "Asha");
        assert_eq!(reg.email, "asha@campus.edu");
        assert_eq!(reg.role, Role::Student);
    }

    #[test]
    fn students_need_branch_and_semester() {
        let input = RegistrationInput {
            branch: None,
            semester: None,
            ..student()
        };
        let errors = validate_registration(input).unwrap_err();
        assert_eq!(fields(&errors), vec!["branch", "semester"]);

        let faculty = RegistrationInput {
            role: Some("faculty".into()),
            branch: None,
            semester: None,
            ..student()
        };
        assert!(validate_registration(faculty).is_ok());
    }

    #[test]
    fn registration_collects_every_error() {
        let errors = validate_registration(RegistrationInput {
            email: Some("nope".into()),
            password: Some("123".into()),
            role: Some("dean".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(
            fields(&errors),
            vec!["name", "email", "password", "role", "department"]
        );
    }

    #[test]
    fn doubt_limits() {
        let ok = validate_new_doubt(DoubtInput {
            title: Some(" Why ".into()),
            description: Some("Because".into()),
            subject: Some("Math".into()),
            tags: vec![" calculus ".into(), "".into()],
            is_urgent: true,
        })
        .unwrap();
        assert_eq!(ok.title, "Why");
        assert_eq!(ok.tags, vec!["calculus"]);

        let errors = validate_new_doubt(DoubtInput {
            title: Some("t".repeat(201)),
            description: Some("d".repeat(5001)),
            subject: None,
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(fields(&errors), vec!["title", "description", "subject"]);
    }

    #[test]
    fn split_tags_drops_blanks() {
        assert_eq!(split_tags("a, b ,,c "), vec!["a", "b", "c"]);
    }

    #[test]
    fn vote_type_must_be_known() {
        assert_eq!(validate_vote(Some("upvote")).unwrap(), VoteKind::Upvote);
        assert!(validate_vote(Some("sideways")).is_err());
        assert!(validate_vote(None).is_err());
    }

    #[test]
    fn answer_content_bounds() {
        assert!(validate_answer_content(Some("   ".into())).is_err());
        assert!(validate_answer_content(Some("a".repeat(5001))).is_err());
        assert_eq!(validate_answer_content(Some(" ok ".into())).unwrap(), "ok");
    }

    #[test]
    fn tag_names_are_lowercased_and_category_checked() {
        let tag = validate_new_tag(TagInput {
            name: Some(" Rust ".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(tag.name, "rust");
        assert_eq!(tag.category, TagCategory::General);

        let bad = validate_new_tag(TagInput {
            name: Some("x".into()),
            category: Some("food".into()),
            ..Default::default()
        });
        assert!(bad.is_err());
    }

    #[test]
    fn pagination_defaults_and_bounds() {
        assert_eq!(
            page_request(None, None, 10).unwrap(),
            PageRequest { page: 1, limit: 10 }
        );
        assert!(page_request(Some(0), None, 10).is_err());
        assert!(page_request(None, Some(101), 10).is_err());
    }
}
