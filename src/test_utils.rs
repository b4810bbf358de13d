/// # Test Utilities Module
///
/// Fixtures shared by the unit tests: isolated in-memory sessions with an
/// optional sample schema.

use crate::core::db::{ConnectOptions, DataAccess};

/// Isolated database test fixture
pub struct DataAccessFixture {
    pub db: DataAccess,
}

impl DataAccessFixture {
    /// Create a fresh in-memory session
    pub fn new() -> Self {
        let db = DataAccess::connect(&ConnectOptions::in_memory())
            .expect("in-memory database should open");
        DataAccessFixture { db }
    }

    /// Create fixture with sample data schema
    ///
    /// The schema is built through the raw connection, so the session's
    /// counters stay at zero.
    pub fn with_sample_data() -> Self {
        let fixture = Self::new();
        fixture
            .db
            .connection()
            .execute_batch(
                "
                CREATE TABLE users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT NOT NULL UNIQUE,
                    email TEXT NOT NULL UNIQUE,
                    active BOOLEAN DEFAULT 1
                );

                INSERT INTO users (username, email) VALUES ('alice', 'alice@example.com');
                INSERT INTO users (username, email) VALUES ('bob', 'bob@example.com');
                INSERT INTO users (username, email) VALUES ('charlie', 'charlie@example.com');
            ",
            )
            .expect("sample schema should load");
        fixture
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_data_fixture() {
        let fixture = DataAccessFixture::with_sample_data();
        let count: i64 = fixture
            .db
            .connection()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .expect("Failed to count users");

        assert_eq!(count, 3);
        assert_eq!(fixture.db.query_count(), 0);
    }
}
