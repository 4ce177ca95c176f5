mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use dock_core::{Error as DockError, FileStatus, InitOutcome, Spacedock};
use output::*;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Dock - a minimal version-control engine
#[derive(Parser)]
#[command(name = "dock")]
#[command(about = "Version control with content-addressed blobs, starlogs and courses", long_about = None)]
#[command(version)]
struct Cli {
    /// Repository root (defaults to the nearest directory containing .dock)
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a spacedock, or repair a damaged one
    Start {
        /// Directory to start in (defaults to --root or the current directory)
        path: Option<PathBuf>,
    },

    /// Stage files for the next starlog
    Beam {
        /// Files or directories to stage
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Record or list starlogs
    Starlog {
        /// Record the beamed files as a new starlog
        #[arg(short, long, requires = "message", conflicts_with = "list")]
        create: bool,

        /// Starlog message
        #[arg(short, long)]
        message: Option<String>,

        /// List every starlog, newest first
        #[arg(short, long)]
        list: bool,
    },

    /// List courses, start a new course from the current one, or delete one
    Course {
        /// Course to create (lists courses if omitted)
        name: Option<String>,

        /// Delete the named course instead of creating it
        #[arg(short, long, requires = "name")]
        delete: bool,
    },

    /// Switch the working tree to another course
    Warp {
        /// Target course
        course: String,
    },

    /// Show beamed, modified, deleted and untracked files
    Scan,

    /// Show or set the author identity
    Config {
        /// Author name
        #[arg(long)]
        name: Option<String>,

        /// Author email
        #[arg(long)]
        email: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let output = OutputWriter::new(cli.json);
    let result = run(cli, &output);

    match result {
        Ok(()) => Ok(()),
        Err(err) => {
            if let Some(DockError::NothingToCommit { reason }) = err.downcast_ref::<DockError>() {
                let notice = NoticeOutput {
                    success: true,
                    result_code: 0,
                    notice: format!("Nothing to record: {}", reason),
                };
                return output.write(&notice, || format!("{}\n", notice.notice));
            }
            if output.is_json() {
                output.write_error(&err, 1);
                std::process::exit(1);
            }
            Err(err)
        }
    }
}

/// Log to stderr, filtered by `DOCK_LOG` (default `warn`).
fn init_logging() {
    let filter = EnvFilter::try_from_env("DOCK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    Registry::default()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();
}

fn run(cli: Cli, output: &OutputWriter) -> Result<()> {
    if let Commands::Start { path } = &cli.command {
        let root = path
            .clone()
            .or_else(|| cli.root.clone())
            .unwrap_or_else(|| PathBuf::from("."));
        return cmd_start(&root, output);
    }

    let root = resolve_root(cli.root)?;
    let dock = Spacedock::open(&root)
        .with_context(|| format!("Failed to open spacedock at {}", root.display()))?;

    match cli.command {
        Commands::Start { .. } => Ok(()),
        Commands::Beam { files } => cmd_beam(&dock, &files, output),
        Commands::Starlog {
            create,
            message,
            list,
        } => match (create, message, list) {
            (true, Some(message), _) => cmd_starlog_create(&dock, &message, output),
            (_, _, true) => cmd_starlog_list(&dock, output),
            _ => anyhow::bail!("Use `dock starlog -c -m <MESSAGE>` or `dock starlog -l`"),
        },
        Commands::Course { name, delete } => match name {
            None => cmd_course_list(&dock, output),
            Some(name) if delete => cmd_course_delete(&dock, &name, output),
            Some(name) => cmd_course_create(&dock, &name, output),
        },
        Commands::Warp { course } => cmd_warp(&dock, &course, output),
        Commands::Scan => cmd_scan(&dock, output),
        Commands::Config { name, email } => cmd_config(&dock, name, email, output),
    }
}

/// `--root` if given, otherwise the nearest enclosing spacedock.
fn resolve_root(root: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(root) = root {
        return Ok(root);
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Spacedock::discover(&cwd).with_context(|| {
        format!(
            "No spacedock found in {} or its parents. Run `dock start` first",
            cwd.display()
        )
    })
}

fn cmd_start(root: &Path, output: &OutputWriter) -> Result<()> {
    let (_, outcome) = Spacedock::init(root)
        .with_context(|| format!("Failed to start spacedock at {}", root.display()))?;

    let (label, repaired) = match &outcome {
        InitOutcome::Created => ("created", Vec::new()),
        InitOutcome::Reinitialized => ("reinitialized", Vec::new()),
        InitOutcome::Repaired(items) => ("repaired", items.iter().map(|s| s.to_string()).collect()),
    };

    let data = StartOutput {
        success: true,
        result_code: 0,
        root: root.display().to_string(),
        outcome: label.to_string(),
        repaired,
    };

    output.write(&data, || match outcome {
        InitOutcome::Created => format!("Started a new spacedock at {}\n", data.root),
        InitOutcome::Reinitialized => format!("Spacedock at {} is already in order\n", data.root),
        InitOutcome::Repaired(_) => format!(
            "Repaired spacedock at {} (recreated: {})\n",
            data.root,
            data.repaired.join(", ")
        ),
    })
}

fn cmd_beam(dock: &Spacedock, files: &[String], output: &OutputWriter) -> Result<()> {
    let report = dock.beam(files).context("Failed to beam files")?;

    let data = BeamOutput {
        success: true,
        result_code: 0,
        beamed: report.beamed,
        unchanged: report.unchanged,
        missing: report.missing,
        ignored: report.ignored,
    };

    output.write(&data, || {
        let mut text = String::new();
        for path in &data.beamed {
            let _ = writeln!(text, "beamed     {}", path);
        }
        for path in &data.unchanged {
            let _ = writeln!(text, "unchanged  {}", path);
        }
        for path in &data.missing {
            let _ = writeln!(text, "not found  {}", path);
        }
        for path in &data.ignored {
            let _ = writeln!(text, "ignored    {}", path);
        }
        if data.beamed.is_empty() {
            text.push_str("No files beamed. Check .dockignore if this is unexpected.\n");
        } else {
            text.push_str("Use `dock starlog -c -m <MESSAGE>` to record.\n");
        }
        text
    })
}

fn cmd_starlog_create(dock: &Spacedock, message: &str, output: &OutputWriter) -> Result<()> {
    let signature = Config::load(dock.dock_dir())?.signature()?;
    let outcome = dock
        .commit(message, &signature)
        .context("Failed to record starlog")?;

    let data = StarlogCreateOutput {
        success: true,
        result_code: 0,
        digest: outcome.digest,
        parent: outcome.parent,
        course: outcome.course,
        recorded: outcome.recorded,
        skipped: outcome.skipped,
        renamed: outcome.renamed,
    };

    output.write(&data, || {
        let mut text = format!(
            "[{} {}] {}\n",
            data.course,
            &data.digest.to_hex()[..12],
            message
        );
        let _ = writeln!(text, " {} file(s) recorded", data.recorded.len());
        for path in &data.skipped {
            let _ = writeln!(text, " skipped {} (no longer exists)", path);
        }
        for rename in &data.renamed {
            let _ = writeln!(text, " renamed {} -> {}", rename.from, rename.to);
        }
        text
    })
}

fn cmd_starlog_list(dock: &Spacedock, output: &OutputWriter) -> Result<()> {
    let starlogs: Vec<StarlogInfo> = dock
        .starlogs()
        .list_all()
        .context("Failed to list starlogs")?
        .into_iter()
        .map(StarlogInfo::from)
        .collect();

    let data = StarlogListOutput {
        success: true,
        result_code: 0,
        starlogs,
    };

    output.write(&data, || {
        if data.starlogs.is_empty() {
            return "No starlogs recorded yet\n".to_string();
        }
        let mut text = String::new();
        for info in &data.starlogs {
            let _ = writeln!(text, "starlog {}", info.digest);
            let _ = writeln!(text, "Author: {} <{}>", info.author, info.email);
            let _ = writeln!(text, "Date:   {}", info.timestamp);
            let _ = writeln!(text);
            for line in info.message.lines() {
                let _ = writeln!(text, "    {}", line);
            }
            let _ = writeln!(text);
        }
        text
    })
}

fn cmd_course_list(dock: &Spacedock, output: &OutputWriter) -> Result<()> {
    let courses = dock.courses();
    let current = courses.current().context("Failed to read HELM")?;

    let mut infos = Vec::new();
    for name in courses.list().context("Failed to list courses")? {
        let latest = courses
            .latest(&name)
            .with_context(|| format!("Failed to read course {}", name))?;
        infos.push(CourseInfo {
            current: name == current,
            name,
            latest,
        });
    }

    let data = CourseListOutput {
        success: true,
        result_code: 0,
        courses: infos,
    };

    output.write(&data, || {
        let mut text = String::new();
        for info in &data.courses {
            let marker = if info.current { "*" } else { " " };
            let _ = writeln!(text, "{} {}", marker, info.name);
        }
        text
    })
}

fn cmd_course_create(dock: &Spacedock, name: &str, output: &OutputWriter) -> Result<()> {
    let latest = dock
        .courses()
        .fork(name)
        .with_context(|| format!("Failed to create course {}", name))?;

    let data = CourseCreateOutput {
        success: true,
        result_code: 0,
        name: name.to_string(),
        latest,
    };

    output.write(&data, || match &data.latest {
        Some(digest) => format!("Created course {} at {}\n", data.name, digest),
        None => format!("Created course {}\n", data.name),
    })
}

fn cmd_course_delete(dock: &Spacedock, name: &str, output: &OutputWriter) -> Result<()> {
    dock.courses()
        .delete(name)
        .with_context(|| format!("Failed to delete course {}", name))?;

    let data = CourseDeleteOutput {
        success: true,
        result_code: 0,
        name: name.to_string(),
    };

    output.write(&data, || format!("Deleted course {}\n", data.name))
}

fn cmd_warp(dock: &Spacedock, course: &str, output: &OutputWriter) -> Result<()> {
    let report = match dock.warp(course) {
        Ok(report) => report,
        Err(err @ DockError::UnsafeWarp { .. }) => {
            let mut detail = String::from("Beam and record your changes first:");
            if let DockError::UnsafeWarp {
                staged,
                modified,
                untracked,
            } = &err
            {
                for (label, paths) in [
                    ("beamed", staged),
                    ("modified", modified),
                    ("untracked", untracked),
                ] {
                    for path in paths {
                        let _ = write!(detail, "\n\t{:<10}{}", format!("{}:", label), path);
                    }
                }
            }
            return Err(anyhow::Error::new(err).context(detail))
                .with_context(|| format!("Failed to warp to {}", course));
        }
        Err(err) => return Err(err).with_context(|| format!("Failed to warp to {}", course)),
    };

    let data = WarpOutput {
        success: true,
        result_code: 0,
        from: report.from,
        to: report.to,
        written: report.written,
        removed: report.removed,
    };

    output.write(&data, || {
        format!(
            "Warped from {} to {} ({} written, {} removed)\n",
            data.from,
            data.to,
            data.written.len(),
            data.removed.len()
        )
    })
}

fn cmd_scan(dock: &Spacedock, output: &OutputWriter) -> Result<()> {
    let scan = dock.scan().context("Failed to scan working tree")?;

    let data = ScanOutput {
        success: true,
        result_code: 0,
        course: scan.course.clone(),
        latest: scan.tip,
        entries: scan
            .entries()
            .iter()
            .map(|(path, status)| ScanEntry {
                path: path.clone(),
                status: *status,
            })
            .collect(),
        renames: scan.renames().to_vec(),
    };

    output.write(&data, || {
        let mut text = format!("On course {}\n", data.course);
        if scan.is_clean() {
            text.push_str("Nothing to beam, working tree clean\n");
            return text;
        }

        let sections = [
            (FileStatus::Staged, "Files beamed for the next starlog:"),
            (FileStatus::Modified, "Changes not beamed:"),
            (FileStatus::Deleted, "Deleted files:"),
            (FileStatus::Untracked, "Untracked files:"),
        ];
        for (status, heading) in sections {
            let paths: Vec<&ScanEntry> =
                data.entries.iter().filter(|e| e.status == status).collect();
            if paths.is_empty() {
                continue;
            }
            let _ = writeln!(text, "\n{}", heading);
            for entry in paths {
                let _ = writeln!(text, "\t{:<10}{}", format!("{}:", status), entry.path);
            }
        }

        if !data.renames.is_empty() {
            let _ = writeln!(text, "\nPossible renames:");
            for rename in &data.renames {
                let _ = writeln!(text, "\t{} -> {}", rename.from, rename.to);
            }
        }
        text
    })
}

fn cmd_config(
    dock: &Spacedock,
    name: Option<String>,
    email: Option<String>,
    output: &OutputWriter,
) -> Result<()> {
    let mut config = Config::load(dock.dock_dir())?;
    if name.is_some() || email.is_some() {
        config.update(name, email);
        config.save(dock.dock_dir())?;
    }

    let data = ConfigOutput {
        success: true,
        result_code: 0,
        name: config.name,
        email: config.email,
    };

    output.write(&data, || {
        format!(
            "name  = {}\nemail = {}\n",
            data.name.as_deref().unwrap_or("(unset)"),
            data.email.as_deref().unwrap_or("(unset)")
        )
    })
}
