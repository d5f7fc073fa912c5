//! Database schema and migrations

use anyhow::Result;
use deadpool_postgres::Object;
use tracing::info;

pub async fn run_migrations(client: &Object) -> Result<()> {
    client.batch_execute(SCHEMA_SQL).await?;
    info!("Database migrations applied");
    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Portal Server Database Schema
-- PostgreSQL migrations for the campus opportunity portal

-- Accounts (students and admins)
CREATE TABLE IF NOT EXISTS users (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(100) NOT NULL,
    email VARCHAR(255) NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role VARCHAR(16) NOT NULL DEFAULT 'student',
    university VARCHAR(255),
    avatar TEXT,
    bio TEXT,
    skills TEXT[] NOT NULL DEFAULT '{}',
    resume TEXT,
    -- Gamification state
    xp BIGINT NOT NULL DEFAULT 0,
    level INTEGER NOT NULL DEFAULT 1,
    badges TEXT[] NOT NULL DEFAULT '{}',
    applications INTEGER NOT NULL DEFAULT 0,
    posts INTEGER NOT NULL DEFAULT 0,
    referrals INTEGER NOT NULL DEFAULT 0,
    early_bird BOOLEAN NOT NULL DEFAULT FALSE,
    -- Account status
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    email_verified BOOLEAN NOT NULL DEFAULT FALSE,
    last_login TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_users_xp ON users(xp DESC);
CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);

-- Job and internship postings
CREATE TABLE IF NOT EXISTS jobs (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    title VARCHAR(100) NOT NULL,
    company VARCHAR(100) NOT NULL,
    description TEXT NOT NULL,
    duration VARCHAR(64) NOT NULL,
    job_type VARCHAR(32) NOT NULL,
    work_type VARCHAR(16) NOT NULL,
    stipend BIGINT NOT NULL DEFAULT 0,
    deadline TIMESTAMPTZ NOT NULL,
    tags TEXT[] NOT NULL DEFAULT '{}',
    domain VARCHAR(128) NOT NULL,
    requirements TEXT[] NOT NULL DEFAULT '{}',
    qualifications TEXT[] NOT NULL DEFAULT '{}',
    location VARCHAR(255),
    contact_email VARCHAR(255),
    contact_phone VARCHAR(64),
    posted_by UUID NOT NULL REFERENCES users(id),
    -- Lifecycle: Active -> Closed is one-way; Active <-> Inactive is owner-toggled.
    -- Expiry is applied lazily on read/write, never by a background sweep.
    status VARCHAR(16) NOT NULL DEFAULT 'Active',
    applicants INTEGER NOT NULL DEFAULT 0,
    views INTEGER NOT NULL DEFAULT 0,
    is_featured BOOLEAN NOT NULL DEFAULT FALSE,
    external_link TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_jobs_status_deadline ON jobs(status, deadline);
CREATE INDEX IF NOT EXISTS idx_jobs_posted_by ON jobs(posted_by);
CREATE INDEX IF NOT EXISTS idx_jobs_domain ON jobs(domain);
CREATE INDEX IF NOT EXISTS idx_jobs_type ON jobs(job_type);
CREATE INDEX IF NOT EXISTS idx_jobs_tags ON jobs USING GIN(tags);
CREATE INDEX IF NOT EXISTS idx_jobs_created ON jobs(created_at DESC);
CREATE INDEX IF NOT EXISTS idx_jobs_search ON jobs
    USING GIN(to_tsvector('english', title || ' ' || company || ' ' || description));

-- Applications: one per (job, applicant), enforced by the storage layer
CREATE TABLE IF NOT EXISTS applications (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    job_id UUID NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
    applicant_id UUID NOT NULL REFERENCES users(id),
    status VARCHAR(16) NOT NULL DEFAULT 'Applied',
    cover_letter TEXT,
    resume TEXT NOT NULL,
    referred_by UUID REFERENCES users(id),
    -- Set exactly once, on the first transition away from 'Applied'
    viewed_by_employer BOOLEAN NOT NULL DEFAULT FALSE,
    viewed_at TIMESTAMPTZ,
    -- Interview sub-record
    interview_scheduled_at TIMESTAMPTZ,
    interview_type VARCHAR(32),
    interview_location VARCHAR(255),
    interview_meeting_link TEXT,
    interview_notes TEXT,
    -- Feedback sub-record
    feedback_rating SMALLINT,
    feedback_comments TEXT,
    feedback_provided_by UUID,
    feedback_provided_at TIMESTAMPTZ,
    -- Withdrawal is settable once, by the applicant only
    is_withdrawn BOOLEAN NOT NULL DEFAULT FALSE,
    withdrawn_at TIMESTAMPTZ,
    withdrawal_reason TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE(job_id, applicant_id)
);

CREATE INDEX IF NOT EXISTS idx_applications_applicant ON applications(applicant_id, status);
CREATE INDEX IF NOT EXISTS idx_applications_job ON applications(job_id, status);
CREATE INDEX IF NOT EXISTS idx_applications_created ON applications(created_at DESC);

-- Audit trail
CREATE TABLE IF NOT EXISTS events (
    id BIGSERIAL PRIMARY KEY,
    event_type VARCHAR(64) NOT NULL,
    entity_type VARCHAR(64),
    entity_id VARCHAR(128),
    payload JSONB,
    actor_id VARCHAR(128),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_events_type ON events(event_type);
CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id);
CREATE INDEX IF NOT EXISTS idx_events_created ON events(created_at DESC);
"#;
