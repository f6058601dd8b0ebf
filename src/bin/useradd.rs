//! Provisioning tool: create a login for a learner or a parent.
//!
//! There is no self-service signup; an admin runs this on the host.
//! Creates the credential database on first use.

use std::process::exit;
use std::str::FromStr;

use sokrates::auth::CredentialStore;
use sokrates::config;
use sokrates::models::Role;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let [_, username, password, role] = args.as_slice() else {
        eprintln!("Usage: useradd <username> <password> <child|parent|admin>");
        exit(2);
    };

    let role = match Role::from_str(role) {
        Ok(r) => r,
        Err(_) => {
            eprintln!("Unknown role '{role}': expected child, parent or admin");
            exit(2);
        }
    };

    if password.len() < 8 {
        eprintln!("Password must be at least 8 characters");
        exit(2);
    }

    let store = match CredentialStore::open(&config::users_db_path()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Cannot open credential database: {e}");
            exit(1);
        }
    };

    match store.create_user(username, password, role) {
        Ok(()) => {
            println!("Created {} ({})", username, role.as_str());
        }
        Err(sokrates::auth::AuthError::UserExists(_)) => {
            eprintln!("User '{username}' already exists");
            exit(1);
        }
        Err(e) => {
            eprintln!("Cannot create user: {e}");
            exit(1);
        }
    }
}
