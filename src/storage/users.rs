//! User repository operations.
//!
//! Read-modify-write sequences (create, course list edits) run inside a
//! single queued transaction so concurrent requests for the same user
//! cannot lose each other's updates.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::Store;
use crate::auth::hash_password;
use crate::error::{Error, Result};
use crate::model::{join_course_list, parse_course_list, NewUser, User};

const SELECT_USER_COLUMNS: &str =
    "SELECT email, first_name, last_name, password, privilege, classes FROM users";

impl Store {
    /// Create a user, hashing the password with the store's salt.
    ///
    /// Fails with [`Error::AlreadyExists`] if the email is taken.
    #[tracing::instrument(skip(self, new_user), fields(email = %new_user.email))]
    pub async fn create_user(&self, new_user: NewUser) -> Result<User> {
        if new_user.email.trim().is_empty() {
            return Err(Error::InvalidArgument("email cannot be empty".into()));
        }

        let password_hash = hash_password(&self.password_salt, &new_user.password);
        let user = self
            .queue
            .transaction(move |tx| {
                if load_user(tx, &new_user.email)?.is_some() {
                    return Err(Error::AlreadyExists(new_user.email));
                }

                tx.execute(
                    "INSERT INTO users (email, first_name, last_name, password, privilege, classes) VALUES (?1, ?2, ?3, ?4, ?5, '')",
                    params![
                        new_user.email,
                        new_user.first_name,
                        new_user.last_name,
                        password_hash,
                        new_user.privilege,
                    ],
                )?;

                require_user(tx, &new_user.email)
            })
            .await?;

        tracing::info!("User created");
        Ok(user)
    }

    /// Load a user by email.
    pub async fn get_user(&self, email: &str) -> Result<User> {
        let email = email.to_string();
        self.queue.submit(move |conn| require_user(conn, &email)).await
    }

    /// All users, ordered by email.
    pub async fn all_users(&self) -> Result<Vec<User>> {
        self.queue
            .submit(|conn| {
                let mut stmt = conn.prepare(&format!("{SELECT_USER_COLUMNS} ORDER BY email"))?;
                let users = stmt
                    .query_map([], user_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(users)
            })
            .await
    }

    /// Delete a user. Fails with [`Error::NotFound`] for an unknown email.
    #[tracing::instrument(skip(self))]
    pub async fn delete_user(&self, email: &str) -> Result<()> {
        let email = email.to_string();
        self.queue
            .submit(move |conn| {
                let deleted = conn.execute("DELETE FROM users WHERE email = ?1", [&email])?;
                if deleted == 0 {
                    return Err(Error::NotFound(email));
                }
                Ok(())
            })
            .await
    }

    /// Change a user's display name.
    #[tracing::instrument(skip(self, first_name, last_name))]
    pub async fn rename_user(&self, email: &str, first_name: &str, last_name: &str) -> Result<User> {
        let email = email.to_string();
        let first_name = first_name.to_string();
        let last_name = last_name.to_string();
        self.queue
            .transaction(move |tx| {
                let updated = tx.execute(
                    "UPDATE users SET first_name = ?1, last_name = ?2 WHERE email = ?3",
                    params![first_name, last_name, email],
                )?;
                if updated == 0 {
                    return Err(Error::NotFound(email));
                }
                require_user(tx, &email)
            })
            .await
    }

    /// Add a course reference to a user's list.
    ///
    /// A no-op when the course does not exist or is already listed.
    #[tracing::instrument(skip(self))]
    pub async fn add_class(&self, email: &str, term_crn: &str) -> Result<User> {
        let email = email.to_string();
        let term_crn = term_crn.to_string();
        self.queue
            .transaction(move |tx| {
                let mut user = require_user(tx, &email)?;

                let course_exists = tx
                    .query_row(
                        "SELECT 1 FROM courses WHERE term_crn = ?1",
                        [&term_crn],
                        |_| Ok(()),
                    )
                    .optional()?
                    .is_some();

                if !course_exists || user.courses.contains(&term_crn) {
                    return Ok(user);
                }

                user.courses.push(term_crn);
                save_course_list(tx, &user)?;
                Ok(user)
            })
            .await
    }

    /// Remove a course reference from a user's list. A no-op when absent.
    #[tracing::instrument(skip(self))]
    pub async fn remove_class(&self, email: &str, term_crn: &str) -> Result<User> {
        let email = email.to_string();
        let term_crn = term_crn.to_string();
        self.queue
            .transaction(move |tx| {
                let mut user = require_user(tx, &email)?;

                let Some(index) = user.courses.iter().position(|crn| *crn == term_crn) else {
                    return Ok(user);
                };

                user.courses.remove(index);
                save_course_list(tx, &user)?;
                Ok(user)
            })
            .await
    }
}

fn save_course_list(conn: &Connection, user: &User) -> Result<()> {
    conn.execute(
        "UPDATE users SET classes = ?1 WHERE email = ?2",
        params![join_course_list(&user.courses), user.email],
    )?;
    Ok(())
}

fn load_user(conn: &Connection, email: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("{SELECT_USER_COLUMNS} WHERE email = ?1"),
            [email],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

fn require_user(conn: &Connection, email: &str) -> Result<User> {
    load_user(conn, email)?.ok_or_else(|| Error::NotFound(email.to_string()))
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let classes: String = row.get(5)?;
    Ok(User {
        email: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        password_hash: row.get(3)?,
        privilege: row.get(4)?,
        courses: parse_course_list(&classes),
    })
}
