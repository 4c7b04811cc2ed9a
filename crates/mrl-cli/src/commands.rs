use anyhow::Context;
use colored::Colorize;

use mrl_notify::Registry;
use mrl_sdk::Ledger;
use mrl_types::{AccessLevel, PrincipalId, Timestamp};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let ledger = Ledger::open(&cli.dir)
        .with_context(|| format!("failed to open ledger at {}", cli.dir))?;
    let json = matches!(cli.format, OutputFormat::Json);

    match cli.command {
        Command::Init => cmd_init(&cli.dir, &ledger),
        Command::Grant(args) => cmd_grant(&ledger, args),
        Command::Revoke(args) => cmd_revoke(&ledger, args),
        Command::Check(args) => cmd_check(&ledger, args, json),
        Command::Log(args) => cmd_log(&ledger, args),
        Command::History(args) => cmd_history(&ledger, args, json),
        Command::Accesses(args) => cmd_accesses(&ledger, args, json),
        Command::Store(args) => cmd_store(&ledger, args),
        Command::Verify(args) => cmd_verify(&ledger, args, json),
        Command::Details(args) => cmd_details(&ledger, args, json),
        Command::Owned(args) => cmd_owned(&ledger, args),
        Command::Events(args) => cmd_events(&ledger, args),
    }
}

fn principal(s: &str) -> anyhow::Result<PrincipalId> {
    PrincipalId::from_hex(s).with_context(|| format!("invalid principal: {s}"))
}

fn instant(at: Option<u64>) -> Timestamp {
    at.map(Timestamp::from_millis).unwrap_or_else(Timestamp::now)
}

fn cmd_init(dir: &str, ledger: &Ledger) -> anyhow::Result<()> {
    println!(
        "{} Initialized ledger in {}",
        "✓".green().bold(),
        dir.bold()
    );
    println!("  Recovered events: {}", ledger.recovered_events().len());
    Ok(())
}

fn cmd_grant(ledger: &Ledger, args: GrantArgs) -> anyhow::Result<()> {
    let level: AccessLevel = args.level.parse()?;
    let grant = ledger.grant_consent(
        principal(&args.grantor)?,
        principal(&args.grantee)?,
        level,
        Timestamp::from_millis(args.from),
        Timestamp::from_millis(args.until),
        args.purpose,
    )?;

    println!("{} Consent granted", "✓".green().bold());
    println!("  {} → {}", grant.grantor, grant.grantee.to_string().yellow());
    println!("  Level: {}", grant.access_level.to_string().cyan());
    println!("  Window: {} .. {}", grant.valid_from, grant.valid_until);
    if !grant.purpose.is_empty() {
        println!("  Purpose: {}", grant.purpose);
    }
    Ok(())
}

fn cmd_revoke(ledger: &Ledger, args: PairArgs) -> anyhow::Result<()> {
    let removed = ledger.revoke_consent(principal(&args.grantor)?, principal(&args.grantee)?)?;
    println!(
        "{} Consent revoked: {} → {}",
        "✓".green().bold(),
        removed.grantor,
        removed.grantee.to_string().yellow()
    );
    Ok(())
}

fn cmd_check(ledger: &Ledger, args: CheckArgs, json: bool) -> anyhow::Result<()> {
    let grantor = principal(&args.grantor)?;
    let grantee = principal(&args.grantee)?;
    let status = match args.at {
        Some(at) => ledger.check_consent_at(grantor, grantee, Timestamp::from_millis(at)),
        None => ledger.check_consent(grantor, grantee),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    if status.valid {
        println!("{} Consent valid", "✓".green().bold());
        if let Some(level) = status.access_level {
            println!("  Level: {}", level.to_string().cyan());
        }
        println!("  Window: {} .. {}", status.valid_from, status.valid_until);
        println!("  Purpose: {}", status.purpose);
    } else if status.access_level.is_some() {
        println!("{} Consent present but not valid now", "✗".red().bold());
        println!("  Window: {} .. {}", status.valid_from, status.valid_until);
    } else {
        println!("{} No consent on record", "✗".red().bold());
    }
    Ok(())
}

fn cmd_log(ledger: &Ledger, args: LogArgs) -> anyhow::Result<()> {
    let entry = ledger.log_access(
        principal(&args.patient)?,
        principal(&args.accessor)?,
        args.resource,
        args.access_type,
        instant(args.at),
    )?;

    println!(
        "{} Access logged as entry {}",
        "✓".green().bold(),
        format!("#{}", entry.sequence).yellow()
    );
    Ok(())
}

fn cmd_history(ledger: &Ledger, args: HistoryArgs, json: bool) -> anyhow::Result<()> {
    let patient = principal(&args.patient)?;
    let entries = match (args.start, args.end) {
        (Some(start), Some(end)) => ledger.accesses_in_time_range(
            &patient,
            Timestamp::from_millis(start),
            Timestamp::from_millis(end),
            args.limit,
        )?,
        _ => {
            let count = ledger.access_count_for_patient(&patient).min(args.limit);
            (0..count)
                .map(|i| ledger.access_entry_for_patient(&patient, i))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No access entries for {patient}.");
        return Ok(());
    }
    for entry in entries {
        println!(
            "{}  {}  {} by {}  at {}",
            format!("#{}", entry.sequence).yellow(),
            entry.resource_id.bold(),
            entry.access_type.cyan(),
            entry.accessor,
            entry.timestamp
        );
    }
    Ok(())
}

fn cmd_accesses(ledger: &Ledger, args: AccessesArgs, json: bool) -> anyhow::Result<()> {
    let accessor = principal(&args.accessor)?;
    let entries = ledger.accesses_by_accessor(&accessor, args.limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No access entries by {accessor}.");
        return Ok(());
    }
    for entry in entries {
        println!(
            "{}  {}  {} on patient {}  at {}",
            format!("#{}", entry.sequence).yellow(),
            entry.resource_id.bold(),
            entry.access_type.cyan(),
            entry.patient,
            entry.timestamp
        );
    }
    Ok(())
}

fn cmd_store(ledger: &Ledger, args: StoreArgs) -> anyhow::Result<()> {
    use mrl_registry::StoreOutcome;

    let outcome = ledger.store_digest(
        args.content_id,
        args.digest,
        args.content_type,
        principal(&args.owner)?,
        instant(args.at),
    )?;

    match outcome {
        StoreOutcome::Stored(record) => {
            println!("{} Digest stored for {}", "✓".green().bold(), record.content_id.bold());
        }
        StoreOutcome::Updated { record, old_digest } => {
            println!("{} Digest updated for {}", "✓".green().bold(), record.content_id.bold());
            println!("  {} → {}", old_digest.dimmed(), record.digest);
        }
    }
    Ok(())
}

fn cmd_verify(ledger: &Ledger, args: VerifyArgs, json: bool) -> anyhow::Result<()> {
    let verification = ledger.verify_digest(&args.content_id, &args.digest);

    if json {
        println!("{}", serde_json::to_string_pretty(&verification)?);
        return Ok(());
    }

    if verification.is_valid {
        println!("{} Digest matches", "✓".green().bold());
        println!("  Type: {}", verification.content_type.cyan());
        println!("  Registered: {}", verification.timestamp);
    } else {
        println!("{} Digest does not match", "✗".red().bold());
    }
    Ok(())
}

fn cmd_details(ledger: &Ledger, args: DetailsArgs, json: bool) -> anyhow::Result<()> {
    match ledger.digest_details(&args.content_id) {
        Some(record) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                println!("{}", record.content_id.bold());
                println!("  Digest: {}", record.digest);
                println!("  Type: {}", record.content_type.cyan());
                println!("  Owner: {}", record.owner);
                println!("  Registered: {}", record.registered_at);
                println!("  Updated: {}", record.updated_at);
            }
        }
        None => println!("No record for {}.", args.content_id.bold()),
    }
    Ok(())
}

fn cmd_owned(ledger: &Ledger, args: OwnedArgs) -> anyhow::Result<()> {
    let owner = principal(&args.owner)?;
    let count = ledger.owned_count(&owner);
    println!("{count} content id(s) registered by {owner}:");
    for index in 0..count {
        println!("  {}", ledger.owned_id_at(&owner, index)?);
    }
    Ok(())
}

fn cmd_events(ledger: &Ledger, args: EventsArgs) -> anyhow::Result<()> {
    let registry = args.registry.as_deref().map(parse_registry).transpose()?;
    let events = ledger.recovered_events();
    let mut shown = 0usize;
    for event in events
        .iter()
        .filter(|e| registry.map_or(true, |r| e.registry == r))
        .take(args.limit)
    {
        println!(
            "{}  {}  [{}]  {}",
            event.id.to_string().yellow(),
            event.kind.to_string().bold(),
            event.registry.to_string().cyan(),
            event.anchor
        );
        shown += 1;
    }
    println!("{} of {} event(s) in journal.", shown, events.len());
    Ok(())
}

fn parse_registry(s: &str) -> anyhow::Result<Registry> {
    match s.to_ascii_lowercase().as_str() {
        "consent" => Ok(Registry::Consent),
        "audit" => Ok(Registry::Audit),
        "integrity" => Ok(Registry::Integrity),
        other => anyhow::bail!("unknown registry: {other}"),
    }
}
