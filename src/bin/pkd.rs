//! Local PKD service entry point.
//!
//! `pkd serve` runs the daemon (scheduler + stores + directory gateway);
//! the other subcommands are one-shot operator tools against the same
//! container. HTTP routing lives in the front-end service and is not part
//! of this binary.

use {
    anyhow::{Context, Result},
    argh::FromArgs,
    icao_local_pkd::{
        pa::PaRequest,
        sync::ReconcileOptions,
        Config, ServiceContainer,
    },
    std::{fs, path::PathBuf},
    tracing_subscriber::EnvFilter,
};

#[derive(FromArgs)]
/// Local ICAO PKD and Passive Authentication service.
struct Args {
    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Serve(ServeArgs),
    SyncCheck(SyncCheckArgs),
    Reconcile(ReconcileArgs),
    Revalidate(RevalidateArgs),
    Verify(VerifyArgs),
    Import(ImportArgs),
}

#[derive(FromArgs)]
/// Run the scheduler daemon.
#[argh(subcommand, name = "serve")]
struct ServeArgs {}

#[derive(FromArgs)]
/// Compare store and directory counts once.
#[argh(subcommand, name = "sync-check")]
struct SyncCheckArgs {}

#[derive(FromArgs)]
/// Repair missing directory entries from the store.
#[argh(subcommand, name = "reconcile")]
struct ReconcileArgs {
    /// log what would happen without mutating anything
    #[argh(switch)]
    dry_run: bool,

    /// cap on entries per type per run
    #[argh(option, default = "500")]
    batch_size: i64,
}

#[derive(FromArgs)]
/// Re-evaluate validity and revocation of every stored certificate.
#[argh(subcommand, name = "revalidate")]
struct RevalidateArgs {}

#[derive(FromArgs)]
/// Passive Authentication of one document from files.
#[argh(subcommand, name = "verify")]
struct VerifyArgs {
    /// EF.SOD file (raw binary, 0x77-wrapped or bare CMS)
    #[argh(option)]
    sod: PathBuf,

    /// data group files as <number>:<path>, repeatable
    #[argh(option)]
    dg: Vec<String>,

    /// issuing country override (alpha-2 or alpha-3)
    #[argh(option)]
    country: Option<String>,

    /// document number override
    #[argh(option)]
    document: Option<String>,
}

#[derive(FromArgs)]
/// Import certificates (PEM, DER or CMS container) or CRLs into the store.
#[argh(subcommand, name = "import")]
struct ImportArgs {
    /// what the files contain: CSCA, MLSC, DSC, DSC_NC or CRL
    #[argh(option)]
    kind: String,

    /// country override (alpha-2 or alpha-3)
    #[argh(option)]
    country: Option<String>,

    /// files to import
    #[argh(positional)]
    files: Vec<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args: Args = argh::from_env();
    let config = Config::from_env().context("configuration error")?;

    match args.command {
        Command::Serve(_) => serve(config),
        Command::SyncCheck(_) => {
            let container = ServiceContainer::initialize(config)?;
            let record = container.sync_service.run_sync_check(&container.gateway)?;
            println!(
                "status={} total_discrepancy={}",
                record.status,
                record.total_discrepancy()
            );
            container.shutdown();
            Ok(())
        }
        Command::Reconcile(cmd) => {
            let container = ServiceContainer::initialize(config)?;
            let options = ReconcileOptions {
                dry_run: cmd.dry_run,
                max_batch_size: cmd.batch_size,
                ..ReconcileOptions::default()
            };
            let summary = container.reconciler.reconcile(&container.gateway, &options)?;
            println!(
                "status={} succeeded={} failed={} ({}ms)",
                summary.status, summary.success_count, summary.failed_count, summary.duration_ms
            );
            container.shutdown();
            Ok(())
        }
        Command::Revalidate(_) => {
            let container = ServiceContainer::initialize(config)?;
            let run = container
                .sync_service
                .run_revalidation(&container.gateway, "MANUAL")?;
            println!(
                "total={} valid={} expired={} failed={}",
                run.total_count, run.valid_count, run.expired_count, run.failed_count
            );
            container.shutdown();
            Ok(())
        }
        Command::Verify(cmd) => verify(config, cmd),
        Command::Import(cmd) => import(config, cmd),
    }
}

fn serve(config: Config) -> Result<()> {
    let mut container = ServiceContainer::initialize(config)?;
    container.start_scheduler()?;
    println!("pkd daemon running; Ctrl-C to stop");
    // Park until killed; the scheduler threads do the work.
    loop {
        std::thread::park();
    }
}

fn import(config: Config, cmd: ImportArgs) -> Result<()> {
    use icao_local_pkd::{
        store::{CertType, NewCertificate, NewCrl, PutOutcome, SightingMeta, SourceType},
        x509::{extract_certificates, CertificateInfo, CrlInfo},
    };

    let container = ServiceContainer::initialize(config)?;
    let kind = cmd.kind.to_uppercase();
    let upload_id = uuid::Uuid::new_v4().to_string();
    let (mut inserted, mut duplicates) = (0u32, 0u32);

    for file in &cmd.files {
        let data = fs::read(file).with_context(|| format!("reading {}", file.display()))?;
        let file_name = file.file_name().map(|n| n.to_string_lossy().into_owned());

        if kind == "CRL" {
            let crl = CrlInfo::from_der(&data)?;
            container
                .crls
                .put(&NewCrl::from_parsed(&crl, cmd.country.as_deref()))?;
            inserted += 1;
            continue;
        }

        let cert_type = CertType::parse(&kind)
            .with_context(|| format!("unknown certificate type {kind}"))?;
        for der in extract_certificates(&data)? {
            let info = CertificateInfo::from_der(&der)?;
            let mut new_cert = NewCertificate::from_parsed(
                cert_type,
                &info,
                SourceType::Upload,
                cmd.country.as_deref(),
            );
            new_cert.first_upload_id = Some(upload_id.clone());
            let sighting = SightingMeta {
                upload_id: Some(upload_id.clone()),
                source_type: Some("FILE_IMPORT".to_string()),
                source_country: Some(new_cert.country_code.clone()),
                source_file_name: file_name.clone(),
                ..SightingMeta::default()
            };
            match container.certificates.put(&new_cert, &sighting)? {
                PutOutcome::Inserted(_) => inserted += 1,
                PutOutcome::Duplicate(_) => duplicates += 1,
            }
        }
    }

    println!("imported={inserted} duplicates={duplicates} upload={upload_id}");
    container.shutdown();
    Ok(())
}

fn verify(config: Config, cmd: VerifyArgs) -> Result<()> {
    let container = ServiceContainer::initialize(config)?;
    let sod = fs::read(&cmd.sod).with_context(|| format!("reading {}", cmd.sod.display()))?;

    let mut data_groups = Vec::new();
    for spec in &cmd.dg {
        let (number, path) = spec
            .split_once(':')
            .context("data group must be <number>:<path>")?;
        let number: u8 = number.parse().context("data group number")?;
        let contents = fs::read(path).with_context(|| format!("reading {path}"))?;
        data_groups.push((number, contents));
    }

    let request = PaRequest {
        sod,
        data_groups,
        document_number: cmd.document,
        country_code: cmd.country,
        ..PaRequest::default()
    };
    let mut session = container.gateway.session()?;
    let outcome = container.pa_engine.verify(&request, &mut session)?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    drop(session);
    container.shutdown();
    Ok(())
}
