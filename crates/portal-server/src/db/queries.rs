//! Database queries for the portal server (PostgreSQL)

use crate::models::{
    ApplicantSummary, Application, ApplicationStatus, ApplicationWithApplicant,
    ApplicationWithJob, BadgeStat, CountBucket, CreateJobRequest, Credentials, Feedback,
    FeedbackInput, InterviewDetails, InterviewInput, Job, JobPoster, JobStatus, JobSummary,
    JobType, LevelStat, Role, UniversityStat, UpdateJobRequest, UpdateProfileRequest, User,
    WorkType,
};
use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;

const USER_COLS: &str = "id, name, email, role, university, avatar, bio, skills, resume, \
     xp, level, badges, applications, posts, referrals, early_bird, is_active, last_login, created_at";

const JOB_COLS: &str = "j.id, j.title, j.company, j.description, j.duration, j.job_type, \
     j.work_type, j.stipend, j.deadline, j.tags, j.domain, j.requirements, j.qualifications, \
     j.location, j.contact_email, j.contact_phone, j.posted_by, j.status, j.applicants, j.views, \
     j.is_featured, j.external_link, j.created_at, j.updated_at";

const APP_COLS: &str = "id, job_id, applicant_id, status, cover_letter, resume, referred_by, \
     viewed_by_employer, viewed_at, interview_scheduled_at, interview_type, interview_location, \
     interview_meeting_link, interview_notes, feedback_rating, feedback_comments, \
     feedback_provided_by, feedback_provided_at, is_withdrawn, withdrawn_at, withdrawal_reason, \
     created_at";

const APP_COLS_A: &str = "a.id, a.job_id, a.applicant_id, a.status, a.cover_letter, a.resume, \
     a.referred_by, a.viewed_by_employer, a.viewed_at, a.interview_scheduled_at, a.interview_type, \
     a.interview_location, a.interview_meeting_link, a.interview_notes, a.feedback_rating, \
     a.feedback_comments, a.feedback_provided_by, a.feedback_provided_at, a.is_withdrawn, \
     a.withdrawn_at, a.withdrawal_reason, a.created_at";

fn user_from_row(row: &Row) -> User {
    User {
        id: row.get::<_, Uuid>("id").to_string(),
        name: row.get("name"),
        email: row.get("email"),
        role: Role::from(row.get::<_, String>("role").as_str()),
        university: row.get("university"),
        avatar: row.get("avatar"),
        bio: row.get("bio"),
        skills: row.get("skills"),
        resume: row.get("resume"),
        xp: row.get("xp"),
        level: row.get("level"),
        badges: row.get("badges"),
        applications: row.get("applications"),
        posts: row.get("posts"),
        referrals: row.get("referrals"),
        early_bird: row.get("early_bird"),
        is_active: row.get("is_active"),
        last_login: row
            .get::<_, Option<DateTime<Utc>>>("last_login")
            .map(|dt| dt.timestamp()),
        created_at: row.get::<_, DateTime<Utc>>("created_at").timestamp(),
    }
}

fn job_from_row(row: &Row) -> Job {
    Job {
        id: row.get::<_, Uuid>("id").to_string(),
        title: row.get("title"),
        company: row.get("company"),
        description: row.get("description"),
        duration: row.get("duration"),
        job_type: JobType::from(row.get::<_, String>("job_type").as_str()),
        work_type: WorkType::from(row.get::<_, String>("work_type").as_str()),
        stipend: row.get("stipend"),
        deadline: row.get::<_, DateTime<Utc>>("deadline").timestamp(),
        tags: row.get("tags"),
        domain: row.get("domain"),
        requirements: row.get("requirements"),
        qualifications: row.get("qualifications"),
        location: row.get("location"),
        contact_email: row.get("contact_email"),
        contact_phone: row.get("contact_phone"),
        posted_by: JobPoster {
            id: row.get::<_, Uuid>("posted_by").to_string(),
            name: row.get("poster_name"),
            email: row.get("poster_email"),
        },
        status: JobStatus::from(row.get::<_, String>("status").as_str()),
        applicants: row.get("applicants"),
        views: row.get("views"),
        is_featured: row.get("is_featured"),
        external_link: row.get("external_link"),
        created_at: row.get::<_, DateTime<Utc>>("created_at").timestamp(),
        updated_at: row.get::<_, DateTime<Utc>>("updated_at").timestamp(),
    }
}

fn application_from_row(row: &Row) -> Application {
    let interview_scheduled_at: Option<DateTime<Utc>> = row.get("interview_scheduled_at");
    let interview_type: Option<String> = row.get("interview_type");
    let interview_location: Option<String> = row.get("interview_location");
    let interview_meeting_link: Option<String> = row.get("interview_meeting_link");
    let interview_notes: Option<String> = row.get("interview_notes");
    let interview = if interview_scheduled_at.is_some()
        || interview_type.is_some()
        || interview_location.is_some()
        || interview_meeting_link.is_some()
        || interview_notes.is_some()
    {
        Some(InterviewDetails {
            scheduled_at: interview_scheduled_at.map(|dt| dt.timestamp()),
            interview_type,
            location: interview_location,
            meeting_link: interview_meeting_link,
            notes: interview_notes,
        })
    } else {
        None
    };

    let feedback_rating: Option<i16> = row.get("feedback_rating");
    let feedback_comments: Option<String> = row.get("feedback_comments");
    let feedback = if feedback_rating.is_some() || feedback_comments.is_some() {
        Some(Feedback {
            rating: feedback_rating,
            comments: feedback_comments,
            provided_by: row
                .get::<_, Option<Uuid>>("feedback_provided_by")
                .map(|u| u.to_string()),
            provided_at: row
                .get::<_, Option<DateTime<Utc>>>("feedback_provided_at")
                .map(|dt| dt.timestamp()),
        })
    } else {
        None
    };

    Application {
        id: row.get::<_, Uuid>("id").to_string(),
        job_id: row.get::<_, Uuid>("job_id").to_string(),
        applicant_id: row.get::<_, Uuid>("applicant_id").to_string(),
        status: ApplicationStatus::from(row.get::<_, String>("status").as_str()),
        cover_letter: row.get("cover_letter"),
        resume: row.get("resume"),
        referred_by: row
            .get::<_, Option<Uuid>>("referred_by")
            .map(|u| u.to_string()),
        viewed_by_employer: row.get("viewed_by_employer"),
        viewed_at: row
            .get::<_, Option<DateTime<Utc>>>("viewed_at")
            .map(|dt| dt.timestamp()),
        interview,
        feedback,
        is_withdrawn: row.get("is_withdrawn"),
        withdrawn_at: row
            .get::<_, Option<DateTime<Utc>>>("withdrawn_at")
            .map(|dt| dt.timestamp()),
        withdrawal_reason: row.get("withdrawal_reason"),
        created_at: row.get::<_, DateTime<Utc>>("created_at").timestamp(),
    }
}

// ============================================================================
// USERS
// ============================================================================

pub async fn create_user(
    pool: &Pool,
    name: &str,
    email: &str,
    password_hash: &str,
    role: Role,
    university: Option<&str>,
    early_bird: bool,
) -> Result<User> {
    let client = pool.get().await?;
    let row = client
        .query_one(
            &format!(
                "INSERT INTO users (name, email, password_hash, role, university, early_bird)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 RETURNING {USER_COLS}"
            ),
            &[
                &name,
                &email,
                &password_hash,
                &role.as_str(),
                &university,
                &early_bird,
            ],
        )
        .await?;
    Ok(user_from_row(&row))
}

pub async fn get_user(pool: &Pool, id: Uuid) -> Result<Option<User>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            &format!("SELECT {USER_COLS} FROM users WHERE id = $1"),
            &[&id],
        )
        .await?;
    Ok(row.map(|row| user_from_row(&row)))
}

pub async fn get_user_by_email(pool: &Pool, email: &str) -> Result<Option<User>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            &format!("SELECT {USER_COLS} FROM users WHERE email = $1"),
            &[&email],
        )
        .await?;
    Ok(row.map(|row| user_from_row(&row)))
}

pub async fn get_credentials(pool: &Pool, email: &str, role: Role) -> Result<Option<Credentials>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            "SELECT id, password_hash, role, is_active FROM users WHERE email = $1 AND role = $2",
            &[&email, &role.as_str()],
        )
        .await?;
    Ok(row.map(|row| Credentials {
        user_id: row.get(0),
        password_hash: row.get(1),
        role: Role::from(row.get::<_, String>(2).as_str()),
        is_active: row.get(3),
    }))
}

pub async fn get_credentials_by_id(pool: &Pool, id: Uuid) -> Result<Option<Credentials>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            "SELECT id, password_hash, role, is_active FROM users WHERE id = $1",
            &[&id],
        )
        .await?;
    Ok(row.map(|row| Credentials {
        user_id: row.get(0),
        password_hash: row.get(1),
        role: Role::from(row.get::<_, String>(2).as_str()),
        is_active: row.get(3),
    }))
}

pub async fn count_users(pool: &Pool) -> Result<i64> {
    let client = pool.get().await?;
    let row = client.query_one("SELECT COUNT(*) FROM users", &[]).await?;
    Ok(row.get(0))
}

pub async fn touch_last_login(pool: &Pool, id: Uuid) -> Result<()> {
    let client = pool.get().await?;
    client
        .execute("UPDATE users SET last_login = NOW() WHERE id = $1", &[&id])
        .await?;
    Ok(())
}

pub async fn update_profile(
    pool: &Pool,
    id: Uuid,
    req: &UpdateProfileRequest,
) -> Result<Option<User>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            &format!(
                "UPDATE users SET
                    name = COALESCE($2, name),
                    university = COALESCE($3, university),
                    bio = COALESCE($4, bio),
                    skills = COALESCE($5, skills),
                    avatar = COALESCE($6, avatar)
                 WHERE id = $1
                 RETURNING {USER_COLS}"
            ),
            &[
                &id,
                &req.name,
                &req.university,
                &req.bio,
                &req.skills,
                &req.avatar,
            ],
        )
        .await?;
    Ok(row.map(|row| user_from_row(&row)))
}

pub async fn set_password(pool: &Pool, id: Uuid, password_hash: &str) -> Result<()> {
    let client = pool.get().await?;
    client
        .execute(
            "UPDATE users SET password_hash = $2 WHERE id = $1",
            &[&id, &password_hash],
        )
        .await?;
    Ok(())
}

pub async fn set_user_active(pool: &Pool, id: Uuid, is_active: bool) -> Result<Option<User>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            &format!("UPDATE users SET is_active = $2 WHERE id = $1 RETURNING {USER_COLS}"),
            &[&id, &is_active],
        )
        .await?;
    Ok(row.map(|row| user_from_row(&row)))
}

pub async fn delete_user(pool: &Pool, id: Uuid) -> Result<bool> {
    let client = pool.get().await?;
    let result = client
        .execute("DELETE FROM users WHERE id = $1", &[&id])
        .await?;
    Ok(result > 0)
}

pub async fn list_users(
    pool: &Pool,
    role: Option<Role>,
    search: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<User>, i64)> {
    let client = pool.get().await?;
    let role_str = role.map(|r| r.as_str());
    let rows = client
        .query(
            &format!(
                "SELECT {USER_COLS} FROM users
                 WHERE ($1::TEXT IS NULL OR role = $1)
                   AND ($2::TEXT IS NULL
                        OR name ILIKE '%' || $2 || '%'
                        OR email ILIKE '%' || $2 || '%'
                        OR university ILIKE '%' || $2 || '%')
                 ORDER BY created_at DESC
                 LIMIT $3 OFFSET $4"
            ),
            &[&role_str, &search, &limit, &offset],
        )
        .await?;

    let total = client
        .query_one(
            "SELECT COUNT(*) FROM users
             WHERE ($1::TEXT IS NULL OR role = $1)
               AND ($2::TEXT IS NULL
                    OR name ILIKE '%' || $2 || '%'
                    OR email ILIKE '%' || $2 || '%'
                    OR university ILIKE '%' || $2 || '%')",
            &[&role_str, &search],
        )
        .await?
        .get(0);

    Ok((rows.iter().map(user_from_row).collect(), total))
}

pub async fn search_users(pool: &Pool, q: &str, role: Option<Role>) -> Result<Vec<User>> {
    let client = pool.get().await?;
    let role_str = role.map(|r| r.as_str());
    let rows = client
        .query(
            &format!(
                "SELECT {USER_COLS} FROM users
                 WHERE (name ILIKE '%' || $1 || '%'
                        OR email ILIKE '%' || $1 || '%'
                        OR university ILIKE '%' || $1 || '%')
                   AND ($2::TEXT IS NULL OR role = $2)
                 ORDER BY xp DESC
                 LIMIT 20"
            ),
            &[&q, &role_str],
        )
        .await?;
    Ok(rows.iter().map(user_from_row).collect())
}

/// Persist a recomputed score and derived level. Plain overwrite: point
/// awards are read-modify-write by design.
pub async fn set_user_score(pool: &Pool, id: Uuid, xp: i64, level: i32) -> Result<()> {
    let client = pool.get().await?;
    client
        .execute(
            "UPDATE users SET xp = $2, level = $3 WHERE id = $1",
            &[&id, &xp, &level],
        )
        .await?;
    Ok(())
}

/// Append newly earned badges. The badge set only ever grows.
pub async fn append_badges(pool: &Pool, id: Uuid, badges: &[String]) -> Result<()> {
    let client = pool.get().await?;
    let badges: Vec<String> = badges.to_vec();
    client
        .execute(
            "UPDATE users SET badges = badges || $2 WHERE id = $1",
            &[&id, &badges],
        )
        .await?;
    Ok(())
}

/// Atomic increment for one of the activity counters.
pub async fn increment_user_counter(
    pool: &Pool,
    id: Uuid,
    counter: &str,
) -> Result<Option<User>> {
    let column = match counter {
        "applications" => "applications",
        "posts" => "posts",
        "referrals" => "referrals",
        other => bail!("unknown counter: {}", other),
    };

    let client = pool.get().await?;
    let row = client
        .query_opt(
            &format!(
                "UPDATE users SET {column} = {column} + 1 WHERE id = $1 RETURNING {USER_COLS}"
            ),
            &[&id],
        )
        .await?;
    Ok(row.map(|row| user_from_row(&row)))
}

// ============================================================================
// JOBS
// ============================================================================

/// Lazy expiry: persist `Closed` for an active job whose deadline has
/// passed. Called on every single-job read or write path.
pub async fn close_expired_job(pool: &Pool, id: Uuid) -> Result<()> {
    let client = pool.get().await?;
    client
        .execute(
            "UPDATE jobs SET status = 'Closed', updated_at = NOW()
             WHERE id = $1 AND status = 'Active' AND deadline <= NOW()",
            &[&id],
        )
        .await?;
    Ok(())
}

pub async fn get_job(pool: &Pool, id: Uuid) -> Result<Option<Job>> {
    close_expired_job(pool, id).await?;

    let client = pool.get().await?;
    let row = client
        .query_opt(
            &format!(
                "SELECT {JOB_COLS}, u.name AS poster_name, u.email AS poster_email
                 FROM jobs j JOIN users u ON j.posted_by = u.id
                 WHERE j.id = $1"
            ),
            &[&id],
        )
        .await?;
    Ok(row.map(|row| job_from_row(&row)))
}

pub async fn create_job(pool: &Pool, posted_by: Uuid, req: &CreateJobRequest) -> Result<Job> {
    let client = pool.get().await?;
    let row = client
        .query_one(
            "INSERT INTO jobs (title, company, description, duration, job_type, work_type,
                               stipend, deadline, tags, domain, requirements, qualifications,
                               location, contact_email, contact_phone, posted_by, is_featured,
                               external_link)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
             RETURNING id",
            &[
                &req.title,
                &req.company,
                &req.description,
                &req.duration,
                &req.job_type.as_str(),
                &req.work_type.as_str(),
                &req.stipend,
                &req.deadline,
                &req.tags,
                &req.domain,
                &req.requirements,
                &req.qualifications,
                &req.location,
                &req.contact_email,
                &req.contact_phone,
                &posted_by,
                &req.is_featured,
                &req.external_link,
            ],
        )
        .await?;
    let id: Uuid = row.get(0);
    drop(client);

    get_job(pool, id)
        .await?
        .ok_or_else(|| anyhow!("job vanished after insert: {}", id))
}

/// Listing filters; `None` fields are skipped entirely.
#[derive(Debug, Default, Clone)]
pub struct JobFilters {
    pub job_type: Option<String>,
    pub work_type: Option<String>,
    pub domain: Option<String>,
    pub min_stipend: Option<i64>,
    pub max_stipend: Option<i64>,
    pub tags: Option<Vec<String>>,
    pub search: Option<String>,
}

const JOB_FILTER_WHERE: &str = "j.status = 'Active' AND j.deadline > NOW()
       AND ($1::TEXT IS NULL OR j.job_type = $1)
       AND ($2::TEXT IS NULL OR j.work_type = $2)
       AND ($3::TEXT IS NULL OR j.domain ILIKE '%' || $3 || '%')
       AND ($4::BIGINT IS NULL OR j.stipend >= $4)
       AND ($5::BIGINT IS NULL OR j.stipend <= $5)
       AND ($6::TEXT[] IS NULL OR j.tags && $6)
       AND ($7::TEXT IS NULL OR to_tsvector('english', j.title || ' ' || j.company || ' ' || j.description)
            @@ plainto_tsquery('english', $7))";

/// Public listing: only open postings, text search delegated to the engine.
pub async fn list_jobs(
    pool: &Pool,
    filters: &JobFilters,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Job>, i64)> {
    let client = pool.get().await?;
    let rows = client
        .query(
            &format!(
                "SELECT {JOB_COLS}, u.name AS poster_name, u.email AS poster_email
                 FROM jobs j JOIN users u ON j.posted_by = u.id
                 WHERE {JOB_FILTER_WHERE}
                 ORDER BY
                   CASE WHEN $7::TEXT IS NULL THEN 0::FLOAT8
                        ELSE ts_rank(to_tsvector('english', j.title || ' ' || j.company || ' ' || j.description),
                                     plainto_tsquery('english', $7))::FLOAT8 END DESC,
                   j.is_featured DESC,
                   j.created_at DESC
                 LIMIT $8 OFFSET $9"
            ),
            &[
                &filters.job_type,
                &filters.work_type,
                &filters.domain,
                &filters.min_stipend,
                &filters.max_stipend,
                &filters.tags,
                &filters.search,
                &limit,
                &offset,
            ],
        )
        .await?;

    let total = client
        .query_one(
            &format!("SELECT COUNT(*) FROM jobs j WHERE {JOB_FILTER_WHERE}"),
            &[
                &filters.job_type,
                &filters.work_type,
                &filters.domain,
                &filters.min_stipend,
                &filters.max_stipend,
                &filters.tags,
                &filters.search,
            ],
        )
        .await?
        .get(0);

    Ok((rows.iter().map(job_from_row).collect(), total))
}

pub async fn jobs_by_user(
    pool: &Pool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Job>, i64)> {
    let client = pool.get().await?;
    let rows = client
        .query(
            &format!(
                "SELECT {JOB_COLS}, u.name AS poster_name, u.email AS poster_email
                 FROM jobs j JOIN users u ON j.posted_by = u.id
                 WHERE j.posted_by = $1
                 ORDER BY j.created_at DESC
                 LIMIT $2 OFFSET $3"
            ),
            &[&user_id, &limit, &offset],
        )
        .await?;

    let total = client
        .query_one(
            "SELECT COUNT(*) FROM jobs WHERE posted_by = $1",
            &[&user_id],
        )
        .await?
        .get(0);

    Ok((rows.iter().map(job_from_row).collect(), total))
}

pub async fn update_job(pool: &Pool, id: Uuid, req: &UpdateJobRequest) -> Result<Option<Job>> {
    let client = pool.get().await?;
    let status = req.status.map(|s| s.as_str());
    let job_type = req.job_type.map(|t| t.as_str());
    let work_type = req.work_type.map(|w| w.as_str());
    let updated = client
        .execute(
            "UPDATE jobs SET
                title = COALESCE($2, title),
                company = COALESCE($3, company),
                description = COALESCE($4, description),
                duration = COALESCE($5, duration),
                job_type = COALESCE($6, job_type),
                work_type = COALESCE($7, work_type),
                stipend = COALESCE($8, stipend),
                deadline = COALESCE($9, deadline),
                tags = COALESCE($10, tags),
                domain = COALESCE($11, domain),
                requirements = COALESCE($12, requirements),
                qualifications = COALESCE($13, qualifications),
                location = COALESCE($14, location),
                contact_email = COALESCE($15, contact_email),
                contact_phone = COALESCE($16, contact_phone),
                external_link = COALESCE($17, external_link),
                status = COALESCE($18, status),
                is_featured = COALESCE($19, is_featured),
                updated_at = NOW()
             WHERE id = $1",
            &[
                &id,
                &req.title,
                &req.company,
                &req.description,
                &req.duration,
                &job_type,
                &work_type,
                &req.stipend,
                &req.deadline,
                &req.tags,
                &req.domain,
                &req.requirements,
                &req.qualifications,
                &req.location,
                &req.contact_email,
                &req.contact_phone,
                &req.external_link,
                &status,
                &req.is_featured,
            ],
        )
        .await?;
    drop(client);

    if updated == 0 {
        return Ok(None);
    }
    // Re-read through the lazy-expiry path so a past-deadline posting can
    // never be resurrected to Active.
    get_job(pool, id).await
}

pub async fn delete_job(pool: &Pool, id: Uuid) -> Result<bool> {
    let client = pool.get().await?;
    let result = client
        .execute("DELETE FROM jobs WHERE id = $1", &[&id])
        .await?;
    Ok(result > 0)
}

pub async fn increment_job_views(pool: &Pool, id: Uuid) -> Result<()> {
    let client = pool.get().await?;
    client
        .execute("UPDATE jobs SET views = views + 1 WHERE id = $1", &[&id])
        .await?;
    Ok(())
}

pub async fn increment_job_applicants(pool: &Pool, id: Uuid) -> Result<()> {
    let client = pool.get().await?;
    client
        .execute(
            "UPDATE jobs SET applicants = applicants + 1 WHERE id = $1",
            &[&id],
        )
        .await?;
    Ok(())
}

pub async fn job_status_stats(pool: &Pool) -> Result<Vec<CountBucket>> {
    let client = pool.get().await?;
    let rows = client
        .query("SELECT status, COUNT(*) FROM jobs GROUP BY status", &[])
        .await?;
    Ok(rows
        .iter()
        .map(|r| CountBucket {
            key: r.get(0),
            count: r.get(1),
        })
        .collect())
}

pub async fn job_type_stats(pool: &Pool) -> Result<Vec<CountBucket>> {
    let client = pool.get().await?;
    let rows = client
        .query(
            "SELECT job_type, COUNT(*) FROM jobs WHERE status = 'Active' GROUP BY job_type",
            &[],
        )
        .await?;
    Ok(rows
        .iter()
        .map(|r| CountBucket {
            key: r.get(0),
            count: r.get(1),
        })
        .collect())
}

pub async fn job_domain_stats(pool: &Pool) -> Result<Vec<CountBucket>> {
    let client = pool.get().await?;
    let rows = client
        .query(
            "SELECT domain, COUNT(*) FROM jobs WHERE status = 'Active'
             GROUP BY domain ORDER BY COUNT(*) DESC LIMIT 10",
            &[],
        )
        .await?;
    Ok(rows
        .iter()
        .map(|r| CountBucket {
            key: r.get(0),
            count: r.get(1),
        })
        .collect())
}

// ============================================================================
// APPLICATIONS
// ============================================================================

/// Insert a new application. The (job, applicant) unique constraint is the
/// sole arbiter under concurrent submissions: the losing insert returns
/// `None` here and is reported as a duplicate.
pub async fn create_application(
    pool: &Pool,
    job_id: Uuid,
    applicant_id: Uuid,
    cover_letter: Option<&str>,
    resume: &str,
    referred_by: Option<Uuid>,
) -> Result<Option<Application>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            &format!(
                "INSERT INTO applications (job_id, applicant_id, cover_letter, resume, referred_by)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (job_id, applicant_id) DO NOTHING
                 RETURNING {APP_COLS}"
            ),
            &[&job_id, &applicant_id, &cover_letter, &resume, &referred_by],
        )
        .await?;
    Ok(row.map(|row| application_from_row(&row)))
}

pub async fn get_application(pool: &Pool, id: Uuid) -> Result<Option<Application>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            &format!("SELECT {APP_COLS} FROM applications WHERE id = $1"),
            &[&id],
        )
        .await?;
    Ok(row.map(|row| application_from_row(&row)))
}

pub async fn applications_for_applicant(
    pool: &Pool,
    applicant_id: Uuid,
    status: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<ApplicationWithJob>, i64)> {
    let client = pool.get().await?;
    let rows = client
        .query(
            &format!(
                "SELECT {APP_COLS_A},
                        j.id AS job_pk, j.title AS job_title, j.company AS job_company,
                        j.job_type AS job_job_type, j.work_type AS job_work_type,
                        j.stipend AS job_stipend, j.deadline AS job_deadline,
                        j.status AS job_status
                 FROM applications a JOIN jobs j ON a.job_id = j.id
                 WHERE a.applicant_id = $1 AND ($2::TEXT IS NULL OR a.status = $2)
                 ORDER BY a.created_at DESC
                 LIMIT $3 OFFSET $4"
            ),
            &[&applicant_id, &status, &limit, &offset],
        )
        .await?;

    let total = client
        .query_one(
            "SELECT COUNT(*) FROM applications
             WHERE applicant_id = $1 AND ($2::TEXT IS NULL OR status = $2)",
            &[&applicant_id, &status],
        )
        .await?
        .get(0);

    let applications = rows
        .iter()
        .map(|row| ApplicationWithJob {
            application: application_from_row(row),
            job: JobSummary {
                id: row.get::<_, Uuid>("job_pk").to_string(),
                title: row.get("job_title"),
                company: row.get("job_company"),
                job_type: JobType::from(row.get::<_, String>("job_job_type").as_str()),
                work_type: WorkType::from(row.get::<_, String>("job_work_type").as_str()),
                stipend: row.get("job_stipend"),
                deadline: row.get::<_, DateTime<Utc>>("job_deadline").timestamp(),
                status: JobStatus::from(row.get::<_, String>("job_status").as_str()),
            },
        })
        .collect();

    Ok((applications, total))
}

pub async fn applications_for_job(
    pool: &Pool,
    job_id: Uuid,
    status: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<ApplicationWithApplicant>, i64)> {
    let client = pool.get().await?;
    let rows = client
        .query(
            &format!(
                "SELECT {APP_COLS_A},
                        u.id AS applicant_pk, u.name AS applicant_name,
                        u.email AS applicant_email, u.university AS applicant_university,
                        u.avatar AS applicant_avatar, u.xp AS applicant_xp,
                        u.level AS applicant_level, u.badges AS applicant_badges
                 FROM applications a JOIN users u ON a.applicant_id = u.id
                 WHERE a.job_id = $1 AND a.is_withdrawn = FALSE
                   AND ($2::TEXT IS NULL OR a.status = $2)
                 ORDER BY a.created_at DESC
                 LIMIT $3 OFFSET $4"
            ),
            &[&job_id, &status, &limit, &offset],
        )
        .await?;

    let total = client
        .query_one(
            "SELECT COUNT(*) FROM applications
             WHERE job_id = $1 AND is_withdrawn = FALSE
               AND ($2::TEXT IS NULL OR status = $2)",
            &[&job_id, &status],
        )
        .await?
        .get(0);

    let applications = rows
        .iter()
        .map(|row| ApplicationWithApplicant {
            application: application_from_row(row),
            applicant: ApplicantSummary {
                id: row.get::<_, Uuid>("applicant_pk").to_string(),
                name: row.get("applicant_name"),
                email: row.get("applicant_email"),
                university: row.get("applicant_university"),
                avatar: row.get("applicant_avatar"),
                xp: row.get("applicant_xp"),
                level: row.get("applicant_level"),
                badges: row.get("applicant_badges"),
            },
        })
        .collect();

    Ok((applications, total))
}

/// Set a new status. The first transition away from `Applied` stamps
/// `viewed_by_employer`/`viewed_at` exactly once; feedback and interview
/// details are written only when supplied.
pub async fn update_application_status(
    pool: &Pool,
    id: Uuid,
    status: &str,
    feedback: Option<&FeedbackInput>,
    provided_by: Uuid,
    interview: Option<&InterviewInput>,
) -> Result<Option<Application>> {
    let rating = feedback.and_then(|f| f.rating);
    let comments = feedback.and_then(|f| f.comments.clone());
    let interview_scheduled_at = interview.and_then(|i| i.scheduled_at);
    let interview_type = interview.and_then(|i| i.interview_type.clone());
    let interview_location = interview.and_then(|i| i.location.clone());
    let interview_meeting_link = interview.and_then(|i| i.meeting_link.clone());
    let interview_notes = interview.and_then(|i| i.notes.clone());

    let client = pool.get().await?;
    let row = client
        .query_opt(
            &format!(
                "UPDATE applications SET
                    status = $2,
                    viewed_by_employer = viewed_by_employer OR $2 <> 'Applied',
                    viewed_at = CASE WHEN $2 <> 'Applied'
                                     THEN COALESCE(viewed_at, NOW())
                                     ELSE viewed_at END,
                    feedback_rating = COALESCE($3, feedback_rating),
                    feedback_comments = COALESCE($4, feedback_comments),
                    feedback_provided_by = CASE WHEN $3::SMALLINT IS NOT NULL OR $4::TEXT IS NOT NULL
                                                THEN $5 ELSE feedback_provided_by END,
                    feedback_provided_at = CASE WHEN $3::SMALLINT IS NOT NULL OR $4::TEXT IS NOT NULL
                                                THEN NOW() ELSE feedback_provided_at END,
                    interview_scheduled_at = COALESCE($6, interview_scheduled_at),
                    interview_type = COALESCE($7, interview_type),
                    interview_location = COALESCE($8, interview_location),
                    interview_meeting_link = COALESCE($9, interview_meeting_link),
                    interview_notes = COALESCE($10, interview_notes)
                 WHERE id = $1
                 RETURNING {APP_COLS}"
            ),
            &[
                &id,
                &status,
                &rating,
                &comments,
                &provided_by,
                &interview_scheduled_at,
                &interview_type,
                &interview_location,
                &interview_meeting_link,
                &interview_notes,
            ],
        )
        .await?;
    Ok(row.map(|row| application_from_row(&row)))
}

/// One-shot withdrawal. Returns `None` when the application is missing or
/// already withdrawn.
pub async fn withdraw_application(
    pool: &Pool,
    id: Uuid,
    reason: Option<&str>,
) -> Result<Option<Application>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            &format!(
                "UPDATE applications SET
                    is_withdrawn = TRUE,
                    withdrawn_at = NOW(),
                    withdrawal_reason = $2
                 WHERE id = $1 AND is_withdrawn = FALSE
                 RETURNING {APP_COLS}"
            ),
            &[&id, &reason],
        )
        .await?;
    Ok(row.map(|row| application_from_row(&row)))
}

pub async fn application_status_stats(pool: &Pool, applicant_id: Uuid) -> Result<Vec<CountBucket>> {
    let client = pool.get().await?;
    let rows = client
        .query(
            "SELECT status, COUNT(*) FROM applications WHERE applicant_id = $1 GROUP BY status",
            &[&applicant_id],
        )
        .await?;
    Ok(rows
        .iter()
        .map(|r| CountBucket {
            key: r.get(0),
            count: r.get(1),
        })
        .collect())
}

pub async fn count_active_applications(pool: &Pool, applicant_id: Uuid) -> Result<i64> {
    let client = pool.get().await?;
    let row = client
        .query_one(
            "SELECT COUNT(*) FROM applications WHERE applicant_id = $1 AND is_withdrawn = FALSE",
            &[&applicant_id],
        )
        .await?;
    Ok(row.get(0))
}

pub async fn delete_application(pool: &Pool, id: Uuid) -> Result<bool> {
    let client = pool.get().await?;
    let result = client
        .execute("DELETE FROM applications WHERE id = $1", &[&id])
        .await?;
    Ok(result > 0)
}

// ============================================================================
// LEADERBOARD
// ============================================================================

const RANK_FILTER_WHERE: &str = "is_active = TRUE
       AND ($1::TEXT IS NULL OR role = $1)
       AND ($2::TEXT IS NULL OR university ILIKE '%' || $2 || '%')";

/// One leaderboard page: score descending, registration time ascending on
/// ties. Equal score AND equal registration instant is storage-engine order.
pub async fn ranked_users(
    pool: &Pool,
    role: Option<&str>,
    university: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<User>> {
    let client = pool.get().await?;
    let rows = client
        .query(
            &format!(
                "SELECT {USER_COLS} FROM users
                 WHERE {RANK_FILTER_WHERE}
                 ORDER BY xp DESC, created_at ASC
                 LIMIT $3 OFFSET $4"
            ),
            &[&role, &university, &limit, &offset],
        )
        .await?;
    Ok(rows.iter().map(user_from_row).collect())
}

pub async fn count_ranked(pool: &Pool, role: Option<&str>, university: Option<&str>) -> Result<i64> {
    let client = pool.get().await?;
    let row = client
        .query_one(
            &format!("SELECT COUNT(*) FROM users WHERE {RANK_FILTER_WHERE}"),
            &[&role, &university],
        )
        .await?;
    Ok(row.get(0))
}

/// 1-based position: one plus the number of matching accounts with strictly
/// greater score. Always consistent with current scores; no rank table.
pub async fn position_for_xp(
    pool: &Pool,
    role: Option<&str>,
    university: Option<&str>,
    xp: i64,
) -> Result<i64> {
    let client = pool.get().await?;
    let row = client
        .query_one(
            &format!("SELECT COUNT(*) FROM users WHERE {RANK_FILTER_WHERE} AND xp > $3"),
            &[&role, &university, &xp],
        )
        .await?;
    let higher: i64 = row.get(0);
    Ok(higher + 1)
}

pub async fn top_users(pool: &Pool, category: &str, limit: i64) -> Result<Vec<User>> {
    let order = match category {
        "xp" => "xp DESC",
        "applications" => "applications DESC, xp DESC",
        "posts" => "posts DESC, xp DESC",
        "referrals" => "referrals DESC, xp DESC",
        other => bail!("unknown leaderboard category: {}", other),
    };

    let client = pool.get().await?;
    let rows = client
        .query(
            &format!(
                "SELECT {USER_COLS} FROM users
                 WHERE is_active = TRUE AND role = 'student'
                 ORDER BY {order}, created_at ASC
                 LIMIT $1"
            ),
            &[&limit],
        )
        .await?;
    Ok(rows.iter().map(user_from_row).collect())
}

pub async fn count_students(pool: &Pool) -> Result<i64> {
    let client = pool.get().await?;
    let row = client
        .query_one(
            "SELECT COUNT(*) FROM users WHERE is_active = TRUE AND role = 'student'",
            &[],
        )
        .await?;
    Ok(row.get(0))
}

pub async fn avg_student_xp(pool: &Pool) -> Result<f64> {
    let client = pool.get().await?;
    let row = client
        .query_one(
            "SELECT COALESCE(AVG(xp), 0)::FLOAT8 FROM users
             WHERE is_active = TRUE AND role = 'student'",
            &[],
        )
        .await?;
    Ok(row.get(0))
}

pub async fn top_universities(pool: &Pool) -> Result<Vec<UniversityStat>> {
    let client = pool.get().await?;
    let rows = client
        .query(
            "SELECT university, COUNT(*), COALESCE(SUM(xp), 0)::BIGINT FROM users
             WHERE is_active = TRUE AND role = 'student' AND university IS NOT NULL
             GROUP BY university ORDER BY COUNT(*) DESC LIMIT 5",
            &[],
        )
        .await?;
    Ok(rows
        .iter()
        .map(|r| UniversityStat {
            university: r.get(0),
            count: r.get(1),
            total_xp: r.get(2),
        })
        .collect())
}

pub async fn badge_counts(pool: &Pool) -> Result<Vec<BadgeStat>> {
    let client = pool.get().await?;
    let rows = client
        .query(
            "SELECT badge, COUNT(*) FROM users, UNNEST(badges) AS badge
             WHERE is_active = TRUE AND role = 'student'
             GROUP BY badge ORDER BY COUNT(*) DESC",
            &[],
        )
        .await?;
    Ok(rows
        .iter()
        .map(|r| BadgeStat {
            badge: r.get(0),
            count: r.get(1),
        })
        .collect())
}

pub async fn level_counts(pool: &Pool) -> Result<Vec<LevelStat>> {
    let client = pool.get().await?;
    let rows = client
        .query(
            "SELECT level, COUNT(*) FROM users
             WHERE is_active = TRUE AND role = 'student'
             GROUP BY level ORDER BY level ASC",
            &[],
        )
        .await?;
    Ok(rows
        .iter()
        .map(|r| LevelStat {
            level: r.get(0),
            count: r.get(1),
        })
        .collect())
}

// ============================================================================
// EVENTS (audit trail)
// ============================================================================

pub async fn log_event(
    pool: &Pool,
    event_type: &str,
    entity_type: Option<&str>,
    entity_id: Option<&str>,
    payload: Option<&str>,
    actor: Option<&str>,
) -> Result<()> {
    let client = pool.get().await?;
    let payload_json: Option<serde_json::Value> =
        payload.and_then(|s| serde_json::from_str(s).ok());
    client
        .execute(
            "INSERT INTO events (event_type, entity_type, entity_id, payload, actor_id)
             VALUES ($1, $2, $3, $4, $5)",
            &[&event_type, &entity_type, &entity_id, &payload_json, &actor],
        )
        .await?;
    Ok(())
}
