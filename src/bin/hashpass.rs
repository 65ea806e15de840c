//! Prints an argon2 PHC string for seeding the first admin account:
//! `hashpass <password>`

use std::process::ExitCode;

use hospital_site_server::auth::hash_password;

fn main() -> ExitCode {
    let Some(password) = std::env::args().nth(1) else {
        eprintln!("Usage: hashpass <password>");
        return ExitCode::from(2);
    };

    match hash_password(&password) {
        Ok(phc) => {
            println!("{phc}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("hashpass: {e}");
            ExitCode::FAILURE
        }
    }
}
