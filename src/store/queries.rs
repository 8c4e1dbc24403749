pub const CREATE_LEADS: &str = r#"
CREATE TABLE IF NOT EXISTS leads (
  id            INTEGER PRIMARY KEY AUTOINCREMENT,
  email         TEXT NOT NULL UNIQUE,
  name          TEXT,
  phone         TEXT,
  university    TEXT NOT NULL DEFAULT 'other',
  selected_plan TEXT NOT NULL DEFAULT 'free',
  created_at    TEXT NOT NULL
);
"#;

pub const INDEX_LEADS_CREATED_AT: &str =
    "CREATE INDEX IF NOT EXISTS idx_leads_created_at ON leads(created_at);";

pub const INSERT_LEAD: &str = "INSERT INTO leads (email, name, phone, university, selected_plan, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

pub const SELECT_LEADS: &str =
    "SELECT id, email, name, phone, university, selected_plan, created_at
     FROM leads
     ORDER BY created_at DESC";

pub fn schema_statements() -> Vec<&'static str> {
    vec![CREATE_LEADS, INDEX_LEADS_CREATED_AT]
}
