// Command line front end for bcrypt-obsd: the host side the library leaves
// out, i.e. password prompts, random salts and argument parsing.

use std::io::{self, Write};
use std::process::ExitCode;

use bcrypt_obsd::{generate_salt, get_cost, hash, is_valid_format, needs_rehash, verify};
use bcrypt_obsd::{DEFAULT_COST, SALT_LEN};
use clap::{Parser, Subcommand};
use rand::RngCore;
use rpassword::read_password;
use unicode_normalization::UnicodeNormalization;
use zeroize::Zeroizing;

#[derive(Parser)]
#[command(name = "bcrypt-obsd", version, about = "Hash and verify passwords with bcrypt")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Prompt for a password and print its hash
    Hash {
        #[arg(long, env = "BCRYPT_COST", default_value_t = DEFAULT_COST)]
        cost: u32,
        /// Apply NFKC normalization to the password first
        #[arg(long)]
        normalize: bool,
    },
    /// Prompt for a password and check it against a hash
    Verify {
        hash: String,
        #[arg(long)]
        normalize: bool,
    },
    /// Print the cost of a hash
    Cost { hash: String },
    /// Exit with success when the hash was made with another cost
    NeedsRehash {
        hash: String,
        #[arg(long, env = "BCRYPT_COST", default_value_t = DEFAULT_COST)]
        cost: u32,
    },
    /// Check the shape of a hash
    Valid { hash: String },
}

fn prompt_password(prompt: &str, normalize: bool) -> io::Result<Zeroizing<String>> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let password = Zeroizing::new(read_password()?);

    if normalize {
        Ok(Zeroizing::new(password.nfkc().collect::<String>()))
    } else {
        Ok(password)
    }
}

fn random_salt() -> Zeroizing<[u8; SALT_LEN]> {
    let mut salt = Zeroizing::new([0u8; SALT_LEN]);
    rand::thread_rng().fill_bytes(&mut salt[..]);
    salt
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match cli.command {
        Command::Hash { cost, normalize } => {
            let password = prompt_password("Enter password to hash: ", normalize)?;
            let salt = generate_salt(&random_salt()[..], cost)?;
            println!("{}", hash(password.as_bytes(), salt)?);
        }
        Command::Verify { hash, normalize } => {
            let password = prompt_password("Enter password to verify: ", normalize)?;
            let ok = verify(password.as_bytes(), &hash);
            println!("Password verification: {}", if ok { "success" } else { "failed" });
            if !ok {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Cost { hash } => println!("{}", get_cost(&hash)?),
        Command::NeedsRehash { hash, cost } => {
            let rehash = needs_rehash(&hash, cost)?;
            println!("{}", rehash);
            if !rehash {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Valid { hash } => {
            let valid = is_valid_format(&hash);
            println!("{}", valid);
            if !valid {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    env_logger::init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::from(2)
        }
    }
}
