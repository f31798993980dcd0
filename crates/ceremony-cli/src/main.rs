//! Guardian Ceremony CLI
//!
//! Command-line interface for election guardians:
//! - Key ceremony with in-process or channel trustees
//! - End-to-end simulation with missing guardians
//! - Inspection of a stored ceremony record

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use guardian_core::decryption::{DecryptingGuardian, DecryptionMediator};
use guardian_core::keyceremony::{Guardian, KeyCeremonyMediator, KeyCeremonyResults};
use guardian_core::tally::{CiphertextTally, PlaintextVotes, SubmittedBallot};
use guardian_core::{
    CeremonyConfig, Group, KeyCeremonyTrustee, DEFAULT_GUARDIANS, DEFAULT_QUORUM,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::path::{Path, PathBuf};
use trustee_channel::{ChannelDecryptingTrustee, ChannelKeyCeremonyTrustee};
use tracing::{info, warn, Level};

const CEREMONY_FILE: &str = "ceremony.json";

/// Guardian Ceremony - threshold key ceremony and tally decryption
#[derive(Parser)]
#[command(name = "guardian-ceremony")]
#[command(about = "Election guardian key ceremony and decryption")]
#[command(version)]
struct Cli {
    /// Directory for the ceremony record and guardian state
    #[arg(short, long, env = "GUARDIAN_DEST", default_value = "./data")]
    dest: PathBuf,

    /// Group parameters: "standard" or "reduced"
    #[arg(short, long, env = "GUARDIAN_GROUP", default_value = "standard")]
    group: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the key ceremony and store its results
    Keygen {
        /// Number of guardians
        #[arg(short, long, default_value_t = DEFAULT_GUARDIANS)]
        n: usize,

        /// Guardians needed to decrypt
        #[arg(short, long, default_value_t = DEFAULT_QUORUM)]
        k: usize,

        /// Run every guardian behind a message channel
        #[arg(long)]
        channel: bool,
    },

    /// Ceremony, random ballots and a tally decrypted with guardians missing
    Simulate {
        /// Number of guardians
        #[arg(short, long, default_value_t = DEFAULT_GUARDIANS)]
        n: usize,

        /// Guardians needed to decrypt
        #[arg(short, long, default_value_t = DEFAULT_QUORUM)]
        k: usize,

        /// Ballots to cast
        #[arg(short, long, default_value_t = 10)]
        ballots: usize,

        /// Guardians absent at decryption
        #[arg(short, long, default_value_t = 1)]
        missing: usize,

        /// Seed for the simulated votes
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },

    /// Show a stored ceremony record
    Info,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let group = Group::by_name(&cli.group)?;

    match cli.command {
        Commands::Keygen { n, k, channel } => {
            std::fs::create_dir_all(&cli.dest)?;
            run_keygen(&cli.dest, &group, n, k, channel)?;
        }
        Commands::Simulate {
            n,
            k,
            ballots,
            missing,
            seed,
        } => {
            run_simulation(&group, n, k, ballots, missing, seed)?;
        }
        Commands::Info => {
            show_info(&cli.dest)?;
        }
    }

    Ok(())
}

fn new_guardians(group: &Group, config: &CeremonyConfig) -> Result<Vec<Guardian>> {
    (1..=config.number_of_guardians)
        .map(|i| {
            let guardian = Guardian::new(group, format!("guardian-{}", i), i as u32, config, None)?;
            Ok(guardian)
        })
        .collect()
}

fn run_ceremony(
    group: &Group,
    config: &CeremonyConfig,
    channel: bool,
) -> Result<(KeyCeremonyResults, Vec<Guardian>)> {
    let mut guardians = new_guardians(group, config)?;

    if !channel {
        let trustees = guardians
            .iter_mut()
            .map(|g| g as &mut dyn KeyCeremonyTrustee)
            .collect();
        let results = KeyCeremonyMediator::new(group, config, trustees)?.run()?;
        return Ok((results, guardians));
    }

    let mut proxies = guardians
        .into_iter()
        .map(ChannelKeyCeremonyTrustee::spawn)
        .collect::<guardian_core::Result<Vec<_>>>()?;
    let trustees = proxies
        .iter_mut()
        .map(|p| p as &mut dyn KeyCeremonyTrustee)
        .collect();
    let results = KeyCeremonyMediator::new(group, config, trustees)?.run();

    // hand the guardians back even if the ceremony failed
    guardians = proxies
        .into_iter()
        .map(ChannelKeyCeremonyTrustee::shutdown)
        .collect::<guardian_core::Result<Vec<_>>>()?;
    Ok((results?, guardians))
}

fn run_keygen(dest: &Path, group: &Group, n: usize, k: usize, channel: bool) -> Result<()> {
    info!(
        guardians = n,
        quorum = k,
        group = group.name(),
        channel,
        "Starting key ceremony"
    );

    let config = CeremonyConfig::new(n, k)?;
    let (results, guardians) = run_ceremony(group, &config, channel)?;

    let record_path = dest.join(CEREMONY_FILE);
    std::fs::write(&record_path, serde_json::to_string_pretty(&results)?)?;

    for guardian in &guardians {
        let state = guardian.decrypting_trustee()?;
        let path = dest.join(format!("{}.json", guardian.id()));
        std::fs::write(&path, serde_json::to_string_pretty(&state)?)?;
        info!(guardian_id = %guardian.id(), path = ?path, "Guardian state saved");
    }

    info!(path = ?record_path, "Key ceremony completed, record saved");

    println!("Joint Public Key: {}", results.joint_public_key.to_hex());
    println!("Commitment Hash: {}", results.commitment_hash.to_hex());

    Ok(())
}

/// Random single-choice votes for a two-contest ballot
fn random_votes(rng: &mut ChaCha20Rng) -> PlaintextVotes {
    let contests: [(&str, &[&str]); 2] = [
        ("mayor", &["alice", "bob", "carol"]),
        ("measure-1", &["yes", "no"]),
    ];

    let mut votes = PlaintextVotes::new();
    for (contest_id, options) in contests {
        let choice = rng.gen_range(0..options.len());
        let selections = options
            .iter()
            .enumerate()
            .map(|(i, option)| (option.to_string(), u64::from(i == choice)))
            .collect();
        votes.insert(contest_id.to_string(), selections);
    }
    votes
}

fn run_simulation(
    group: &Group,
    n: usize,
    k: usize,
    ballot_count: usize,
    missing: usize,
    seed: u64,
) -> Result<()> {
    if ballot_count == 0 {
        bail!("At least one ballot is needed");
    }
    if n.saturating_sub(missing) < k {
        bail!(
            "Cannot decrypt with {} of {} guardians missing and a quorum of {}",
            missing,
            n,
            k
        );
    }

    let config = CeremonyConfig::new(n, k)?;
    let (results, guardians) = run_ceremony(group, &config, false)?;
    let context = results.election_context(group, group.q_from_u64(seed));

    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut expected = PlaintextVotes::new();
    let mut tally = CiphertextTally::new("simulated-tally");
    let mut spoiled = Vec::new();

    for i in 0..ballot_count {
        let votes = random_votes(&mut rng);
        let ballot = SubmittedBallot::encrypt(
            group,
            format!("ballot-{}", i),
            &votes,
            &context.elgamal_public_key,
        )?;
        tally.accumulate(group, &ballot)?;
        for (contest_id, selections) in &votes {
            let totals = expected.entry(contest_id.clone()).or_default();
            for (selection_id, count) in selections {
                *totals.entry(selection_id.clone()).or_default() += count;
            }
        }
        if i == 0 {
            spoiled.push((ballot, votes));
        }
    }
    info!(ballots = ballot_count, "Ballots cast and tallied");

    let mut mediator = DecryptionMediator::new(
        context,
        results.guardian_records.clone(),
        tally,
        spoiled.iter().map(|(ballot, _)| ballot.clone()).collect(),
    )?;

    // the last `missing` guardians stay away
    let present: Vec<DecryptingGuardian> = guardians
        .iter()
        .take(n - missing)
        .map(Guardian::decrypting_trustee)
        .collect::<guardian_core::Result<_>>()?;
    for guardian in present {
        mediator.announce(Box::new(ChannelDecryptingTrustee::spawn(guardian)?))?;
    }
    info!(missing = ?mediator.missing_guardians(), "Decrypting with guardians missing");

    let plaintext = mediator.get_plaintext_tally()?;
    let counts = plaintext.counts();
    for (contest_id, selections) in &counts {
        println!("{}:", contest_id);
        for (selection_id, count) in selections {
            println!("  {}: {}", selection_id, count);
        }
    }
    if counts != expected {
        bail!("Decrypted tally does not match the votes cast");
    }

    let decrypted_ballots = mediator.decrypt_ballots()?;
    for (ballot, votes) in &spoiled {
        match decrypted_ballots.get(&ballot.object_id) {
            Some(plaintext) if plaintext.counts() == *votes => {}
            _ => bail!("Spoiled ballot '{}' did not decrypt correctly", ballot.object_id),
        }
    }

    if missing == 0 {
        warn!("No guardians were missing; compensation was not exercised");
    }
    println!("Simulation OK: tally and spoiled ballots match");

    Ok(())
}

fn show_info(dest: &Path) -> Result<()> {
    let results = load_results(dest)?;

    println!("Ceremony Info:");
    println!("  Guardians: {}", results.config.number_of_guardians);
    println!("  Quorum: {}", results.config.quorum);
    println!("  Joint Public Key: {}", results.joint_public_key.to_short_string());
    println!("  Commitment Hash: {}", results.commitment_hash.to_hex());
    for record in &results.guardian_records {
        println!(
            "  {} (x = {}): {}",
            record.guardian_id,
            record.x_coordinate,
            record.election_public_key.to_short_string()
        );
    }

    Ok(())
}

fn load_results(dest: &Path) -> Result<KeyCeremonyResults> {
    let path = dest.join(CEREMONY_FILE);
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("Reading {}", path.display()))?;
    let results: KeyCeremonyResults = serde_json::from_str(&json)?;
    Ok(results)
}
