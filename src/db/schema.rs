/// Fixed cache schema. Every statement is `IF NOT EXISTS`, so running it on an
/// existing database only creates what is missing and never alters a table.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS categories (
    category_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    parent_id INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_categories_parent ON categories(parent_id);

-- Categories whose children were all fetched from the remote source
CREATE TABLE IF NOT EXISTS expanded_categories (
    category_id INTEGER PRIMARY KEY
        REFERENCES categories(category_id) ON DELETE CASCADE ON UPDATE CASCADE
);

CREATE TABLE IF NOT EXISTS series (
    series_id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    last_updated TEXT NOT NULL,
    observation_start TEXT NOT NULL,
    observation_end TEXT NOT NULL,
    frequency_short TEXT NOT NULL,
    category_id INTEGER NOT NULL
        REFERENCES categories(category_id) ON DELETE CASCADE ON UPDATE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_series_category ON series(category_id);

CREATE TABLE IF NOT EXISTS observables (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    value REAL,
    series_id TEXT NOT NULL
        REFERENCES series(series_id) ON DELETE CASCADE ON UPDATE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_observables_series ON observables(series_id);
"#;
