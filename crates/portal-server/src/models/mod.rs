//! Data models for the portal server

use serde::{Deserialize, Serialize};

// ============================================================================
// ACCOUNTS
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Admin => "admin",
        }
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        match s {
            "admin" => Role::Admin,
            _ => Role::Student,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub university: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub skills: Vec<String>,
    pub resume: Option<String>,
    pub xp: i64,
    pub level: i32,
    pub badges: Vec<String>,
    pub applications: i32,
    pub posts: i32,
    pub referrals: i32,
    pub early_bird: bool,
    pub is_active: bool,
    pub last_login: Option<i64>,
    pub created_at: i64,
}

/// Login credentials row. Never serialized; the password hash stays
/// inside the auth handlers.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user_id: uuid::Uuid,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: uuid::Uuid,
    pub role: Role,
    pub expires_at: i64,
}

// ============================================================================
// JOBS
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobType {
    Internship,
    #[serde(rename = "Full-time")]
    FullTime,
    #[serde(rename = "Part-time")]
    PartTime,
    Contract,
    Freelance,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Internship => "Internship",
            JobType::FullTime => "Full-time",
            JobType::PartTime => "Part-time",
            JobType::Contract => "Contract",
            JobType::Freelance => "Freelance",
        }
    }
}

impl From<&str> for JobType {
    fn from(s: &str) -> Self {
        match s {
            "Full-time" => JobType::FullTime,
            "Part-time" => JobType::PartTime,
            "Contract" => JobType::Contract,
            "Freelance" => JobType::Freelance,
            _ => JobType::Internship,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WorkType {
    Remote,
    #[serde(rename = "In-office")]
    InOffice,
    Hybrid,
}

impl WorkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkType::Remote => "Remote",
            WorkType::InOffice => "In-office",
            WorkType::Hybrid => "Hybrid",
        }
    }
}

impl From<&str> for WorkType {
    fn from(s: &str) -> Self {
        match s {
            "In-office" => WorkType::InOffice,
            "Hybrid" => WorkType::Hybrid,
            _ => WorkType::Remote,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobStatus {
    Active,
    Inactive,
    Closed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Active => "Active",
            JobStatus::Inactive => "Inactive",
            JobStatus::Closed => "Closed",
        }
    }
}

impl From<&str> for JobStatus {
    fn from(s: &str) -> Self {
        match s {
            "Inactive" => JobStatus::Inactive,
            "Closed" => JobStatus::Closed,
            _ => JobStatus::Active,
        }
    }
}

/// Summary of the posting account embedded in job payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPoster {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub title: String,
    pub company: String,
    pub description: String,
    pub duration: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub work_type: WorkType,
    pub stipend: i64,
    pub deadline: i64,
    pub tags: Vec<String>,
    pub domain: String,
    pub requirements: Vec<String>,
    pub qualifications: Vec<String>,
    pub location: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub posted_by: JobPoster,
    pub status: JobStatus,
    pub applicants: i32,
    pub views: i32,
    pub is_featured: bool,
    pub external_link: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Compact job fields embedded in a student's application list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: String,
    pub title: String,
    pub company: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub work_type: WorkType,
    pub stipend: i64,
    pub deadline: i64,
    pub status: JobStatus,
}

// ============================================================================
// APPLICATIONS
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ApplicationStatus {
    Applied,
    Reviewing,
    Reviewed,
    Shortlisted,
    Interviewed,
    Selected,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "Applied",
            ApplicationStatus::Reviewing => "Reviewing",
            ApplicationStatus::Reviewed => "Reviewed",
            ApplicationStatus::Shortlisted => "Shortlisted",
            ApplicationStatus::Interviewed => "Interviewed",
            ApplicationStatus::Selected => "Selected",
            ApplicationStatus::Rejected => "Rejected",
        }
    }
}

impl From<&str> for ApplicationStatus {
    fn from(s: &str) -> Self {
        match s {
            "Reviewing" => ApplicationStatus::Reviewing,
            "Reviewed" => ApplicationStatus::Reviewed,
            "Shortlisted" => ApplicationStatus::Shortlisted,
            "Interviewed" => ApplicationStatus::Interviewed,
            "Selected" => ApplicationStatus::Selected,
            "Rejected" => ApplicationStatus::Rejected,
            _ => ApplicationStatus::Applied,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewDetails {
    pub scheduled_at: Option<i64>,
    pub interview_type: Option<String>,
    pub location: Option<String>,
    pub meeting_link: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub rating: Option<i16>,
    pub comments: Option<String>,
    pub provided_by: Option<String>,
    pub provided_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: String,
    pub job_id: String,
    pub applicant_id: String,
    pub status: ApplicationStatus,
    pub cover_letter: Option<String>,
    pub resume: String,
    pub referred_by: Option<String>,
    pub viewed_by_employer: bool,
    pub viewed_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interview: Option<InterviewDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
    pub is_withdrawn: bool,
    pub withdrawn_at: Option<i64>,
    pub withdrawal_reason: Option<String>,
    pub created_at: i64,
}

/// Application joined with the job it targets (student's own view).
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationWithJob {
    #[serde(flatten)]
    pub application: Application,
    pub job: JobSummary,
}

/// Compact applicant fields shown to the posting owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub university: Option<String>,
    pub avatar: Option<String>,
    pub xp: i64,
    pub level: i32,
    pub badges: Vec<String>,
}

/// Application joined with the applicant (posting owner's view).
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationWithApplicant {
    #[serde(flatten)]
    pub application: Application,
    pub applicant: ApplicantSummary,
}

// ============================================================================
// LEADERBOARD
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    #[serde(flatten)]
    pub user: User,
    pub rank: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_current_user: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UniversityStat {
    pub university: String,
    pub count: i64,
    pub total_xp: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeStat {
    pub badge: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelStat {
    pub level: i32,
    pub count: i64,
}

/// Generic label/count bucket for grouped statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountBucket {
    pub key: String,
    pub count: i64,
}

// ============================================================================
// REQUESTS
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub university: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub university: Option<String>,
    pub bio: Option<String>,
    pub skills: Option<Vec<String>>,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    pub title: String,
    pub company: String,
    pub description: String,
    pub duration: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub work_type: WorkType,
    pub stipend: i64,
    pub deadline: chrono::DateTime<chrono::Utc>,
    pub tags: Vec<String>,
    pub domain: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub qualifications: Vec<String>,
    pub location: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub external_link: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateJobRequest {
    pub title: Option<String>,
    pub company: Option<String>,
    pub description: Option<String>,
    pub duration: Option<String>,
    #[serde(rename = "type")]
    pub job_type: Option<JobType>,
    pub work_type: Option<WorkType>,
    pub stipend: Option<i64>,
    pub deadline: Option<chrono::DateTime<chrono::Utc>>,
    pub tags: Option<Vec<String>>,
    pub domain: Option<String>,
    pub requirements: Option<Vec<String>>,
    pub qualifications: Option<Vec<String>>,
    pub location: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub external_link: Option<String>,
    pub status: Option<JobStatus>,
    pub is_featured: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    pub job_id: String,
    pub cover_letter: Option<String>,
    pub resume: String,
    pub referred_by: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackInput {
    pub rating: Option<i16>,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewInput {
    pub scheduled_at: Option<chrono::DateTime<chrono::Utc>>,
    pub interview_type: Option<String>,
    pub location: Option<String>,
    pub meeting_link: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateApplicationStatusRequest {
    pub status: ApplicationStatus,
    pub feedback: Option<FeedbackInput>,
    pub interview: Option<InterviewInput>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    pub reason: Option<String>,
}

// ============================================================================
// RESPONSE ENVELOPE
// ============================================================================

/// Uniform response body: `{success, message?, data?, errors?}`.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            errors: None,
        }
    }

    pub fn ok_with_message(message: &str, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.to_string()),
            data: Some(data),
            errors: None,
        }
    }
}

impl ApiResponse<serde_json::Value> {
    pub fn message_only(message: &str) -> Self {
        Self {
            success: true,
            message: Some(message.to_string()),
            data: None,
            errors: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current: i64,
    pub pages: i64,
    pub total: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Self {
            current: page,
            pages,
            total,
            has_next: page < pages,
            has_prev: page > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        assert_eq!(Role::from("student"), Role::Student);
        assert_eq!(Role::from("admin"), Role::Admin);
        assert_eq!(Role::from("unknown"), Role::Student);
        assert_eq!(Role::Student.as_str(), "student");
        assert_eq!(Role::Admin.as_str(), "admin");
    }

    #[test]
    fn test_job_type_strings() {
        assert_eq!(JobType::FullTime.as_str(), "Full-time");
        assert_eq!(JobType::from("Full-time"), JobType::FullTime);
        assert_eq!(JobType::from("Part-time"), JobType::PartTime);
        // Unknown falls back to Internship
        assert_eq!(JobType::from("???"), JobType::Internship);
    }

    #[test]
    fn test_job_type_serde_rename() {
        let json = serde_json::to_string(&JobType::FullTime).unwrap();
        assert_eq!(json, "\"Full-time\"");
        let parsed: JobType = serde_json::from_str("\"Freelance\"").unwrap();
        assert_eq!(parsed, JobType::Freelance);
        // "In-office" is a work arrangement, not a job type
        assert!(serde_json::from_str::<JobType>("\"In-office\"").is_err());
    }

    #[test]
    fn test_work_type_strings() {
        assert_eq!(WorkType::InOffice.as_str(), "In-office");
        assert_eq!(WorkType::from("In-office"), WorkType::InOffice);
        assert_eq!(
            serde_json::to_string(&WorkType::InOffice).unwrap(),
            "\"In-office\""
        );
    }

    #[test]
    fn test_job_status_round_trip() {
        for status in [JobStatus::Active, JobStatus::Inactive, JobStatus::Closed] {
            assert_eq!(JobStatus::from(status.as_str()), status);
        }
        assert_eq!(JobStatus::from("garbage"), JobStatus::Active);
    }

    #[test]
    fn test_application_status_round_trip() {
        for status in [
            ApplicationStatus::Applied,
            ApplicationStatus::Reviewing,
            ApplicationStatus::Reviewed,
            ApplicationStatus::Shortlisted,
            ApplicationStatus::Interviewed,
            ApplicationStatus::Selected,
            ApplicationStatus::Rejected,
        ] {
            assert_eq!(ApplicationStatus::from(status.as_str()), status);
        }
        assert_eq!(ApplicationStatus::from("???"), ApplicationStatus::Applied);
    }

    #[test]
    fn test_pagination_math() {
        let p = Pagination::new(1, 10, 25);
        assert_eq!(p.pages, 3);
        assert!(p.has_next);
        assert!(!p.has_prev);

        let p = Pagination::new(3, 10, 25);
        assert!(!p.has_next);
        assert!(p.has_prev);

        let p = Pagination::new(1, 10, 0);
        assert_eq!(p.pages, 0);
        assert!(!p.has_next);
        assert!(!p.has_prev);

        let p = Pagination::new(1, 10, 10);
        assert_eq!(p.pages, 1);
        assert!(!p.has_next);
    }

    #[test]
    fn test_envelope_skips_empty_fields() {
        let resp = ApiResponse::ok(serde_json::json!({"x": 1}));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["success"], true);
        assert!(json.get("message").is_none());
        assert!(json.get("errors").is_none());

        let resp = ApiResponse::message_only("Logout successful");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["message"], "Logout successful");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_user_serializes_camel_case() {
        let user = User {
            id: "u-1".to_string(),
            name: "Asha".to_string(),
            email: "asha@uni.edu".to_string(),
            role: Role::Student,
            university: Some("State University".to_string()),
            avatar: None,
            bio: None,
            skills: vec!["rust".to_string()],
            resume: None,
            xp: 400,
            level: 2,
            badges: vec![],
            applications: 3,
            posts: 0,
            referrals: 0,
            early_bird: true,
            is_active: true,
            last_login: None,
            created_at: 1_700_000_000,
        };

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["isActive"], true);
        assert_eq!(json["earlyBird"], true);
        assert_eq!(json["createdAt"], 1_700_000_000i64);
        assert_eq!(json["role"], "student");
        assert!(json.get("password").is_none());
        assert!(json.get("passwordHash").is_none());
    }

    #[test]
    fn test_application_flattened_views() {
        let application = Application {
            id: "a-1".to_string(),
            job_id: "j-1".to_string(),
            applicant_id: "u-1".to_string(),
            status: ApplicationStatus::Applied,
            cover_letter: None,
            resume: "https://cdn.example/resume.pdf".to_string(),
            referred_by: None,
            viewed_by_employer: false,
            viewed_at: None,
            interview: None,
            feedback: None,
            is_withdrawn: false,
            withdrawn_at: None,
            withdrawal_reason: None,
            created_at: 1_700_000_000,
        };
        let view = ApplicationWithJob {
            application,
            job: JobSummary {
                id: "j-1".to_string(),
                title: "Backend Intern".to_string(),
                company: "Acme".to_string(),
                job_type: JobType::Internship,
                work_type: WorkType::Remote,
                stipend: 1000,
                deadline: 1_800_000_000,
                status: JobStatus::Active,
            },
        };

        let json = serde_json::to_value(&view).unwrap();
        // Flattened application fields sit next to the embedded job
        assert_eq!(json["jobId"], "j-1");
        assert_eq!(json["job"]["title"], "Backend Intern");
        assert_eq!(json["job"]["type"], "Internship");
    }
}
