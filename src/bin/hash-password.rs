//! Print a bcrypt hash for seeding a user row by hand.
//!
//! Honours `BCRYPT_COST` from the environment or `.env` so hashes match what
//! the server produces.

use bcrypt::hash;
use bloodlink_backend::config::AppConfig;
use std::env;

fn main() {
    dotenvy::dotenv().ok();

    let password = env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: cargo run --bin hash-password <PASSWORD>");
        std::process::exit(1);
    });

    let cost = AppConfig::from_env().bcrypt_cost;

    match hash(&password, cost) {
        Ok(hashed) => {
            println!("\nCost     : {}", cost);
            println!("Hash     : {}\n", hashed);
            println!("# Use as users.password_hash, e.g.:");
            println!(
                "# UPDATE users SET password_hash = '{}' WHERE email = '<email>';",
                hashed
            );
        }
        Err(e) => {
            eprintln!("Error hashing password: {}", e);
            std::process::exit(1);
        }
    }
}
