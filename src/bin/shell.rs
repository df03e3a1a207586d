//! pagekv interactive shell.
//!
//! Reads one command per line from stdin. Type `?` for the command list.

use std::io::{self, BufRead, Write};

use clap::{Parser, ValueEnum};
use pagekv::{Config, Database, EvictionPolicy, Key, PageNum, TableId};
use tracing_subscriber::{fmt, EnvFilter};

/// pagekv shell
#[derive(Parser, Debug)]
#[command(name = "pagekv-shell")]
#[command(about = "Interactive shell for the pagekv B+ tree store")]
#[command(version)]
struct Args {
    /// Number of buffer frames
    #[arg(short, long, default_value = "64")]
    frames: usize,

    /// Eviction policy
    #[arg(short, long, value_enum, default_value = "scan")]
    policy: Policy,

    /// Skip checksum verification when pages are loaded
    #[arg(long)]
    no_checksums: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Policy {
    Scan,
    Lru,
}

impl From<Policy> for EvictionPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::Scan => EvictionPolicy::Scan,
            Policy::Lru => EvictionPolicy::Lru,
        }
    }
}

const HELP: &str = "\
?                         show this list
o <path>                  open a table file
c <table>                 close a table
t                         list tables
i <table> <key> <value>   insert a record
m <table> <first> <last>  insert keys first..last with a fixed value
f <table> <key>           find a key
u <table> <key> <value>   update a record
d <table> <key>           delete a key
r <table> <start> <end>   range scan
j <left> <right> <path>   join two tables into a CSV file
l <table>                 print the leaves
p <table>                 print the tree
n <table> <page>          describe a page
v <table>                 verify the tree
b                         print the buffer frames
x                         print buffer statistics
s                         shut down and exit
q                         exit";

#[derive(Debug, PartialEq)]
enum Command {
    Help,
    Open(String),
    Close(u32),
    Tables,
    Insert(u32, Key, String),
    InsertMany(u32, Key, Key),
    Find(u32, Key),
    Update(u32, Key, String),
    Delete(u32, Key),
    Range(u32, Key, Key),
    Join(u32, u32, String),
    Leaves(u32),
    Tree(u32),
    Page(u32, u64),
    Verify(u32),
    Buffer,
    Stats,
    Shutdown,
    Quit,
}

fn arg<T: std::str::FromStr>(
    parts: &mut std::str::SplitWhitespace<'_>,
    name: &str,
) -> Result<T, String> {
    let raw = parts.next().ok_or_else(|| format!("missing {name}"))?;
    raw.parse().map_err(|_| format!("invalid {name}: {raw}"))
}

/// Rest of the line after the consumed words, for values with spaces.
fn rest(parts: &mut std::str::SplitWhitespace<'_>, name: &str) -> Result<String, String> {
    let text = parts.collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        Err(format!("missing {name}"))
    } else {
        Ok(text)
    }
}

fn parse(line: &str) -> Result<Option<Command>, String> {
    let mut parts = line.split_whitespace();
    let Some(cmd) = parts.next() else {
        return Ok(None);
    };
    let p = &mut parts;
    let command = match cmd {
        "?" => Command::Help,
        "o" => Command::Open(arg(p, "path")?),
        "c" => Command::Close(arg(p, "table")?),
        "t" => Command::Tables,
        "i" => Command::Insert(arg(p, "table")?, arg(p, "key")?, rest(p, "value")?),
        "m" => Command::InsertMany(arg(p, "table")?, arg(p, "first")?, arg(p, "last")?),
        "f" => Command::Find(arg(p, "table")?, arg(p, "key")?),
        "u" => Command::Update(arg(p, "table")?, arg(p, "key")?, rest(p, "value")?),
        "d" => Command::Delete(arg(p, "table")?, arg(p, "key")?),
        "r" => Command::Range(arg(p, "table")?, arg(p, "start")?, arg(p, "end")?),
        "j" => Command::Join(arg(p, "left")?, arg(p, "right")?, arg(p, "path")?),
        "l" => Command::Leaves(arg(p, "table")?),
        "p" => Command::Tree(arg(p, "table")?),
        "n" => Command::Page(arg(p, "table")?, arg(p, "page")?),
        "v" => Command::Verify(arg(p, "table")?),
        "b" => Command::Buffer,
        "x" => Command::Stats,
        "s" => Command::Shutdown,
        "q" => Command::Quit,
        other => return Err(format!("unknown command {other:?}, type ? for help")),
    };
    Ok(Some(command))
}

/// Run one command. Returns false when the shell should exit.
fn execute(db: &mut Database, command: Command) -> pagekv::Result<bool> {
    match command {
        Command::Help => println!("{HELP}"),
        Command::Open(path) => {
            let id = db.open_table(&path)?;
            println!("table {path} opened with id {id}");
        }
        Command::Close(id) => {
            db.close_table(TableId::new(id)?)?;
            println!("table {id} closed");
        }
        Command::Tables => {
            for info in db.describe_tables() {
                let state = if info.open { "open" } else { "closed" };
                println!("{}: {} ({state}, {} pages)", info.id, info.path.display(), info.pages);
            }
        }
        Command::Insert(id, key, value) => {
            db.insert(TableId::new(id)?, key, value.as_bytes())?;
            println!("inserted {key}");
        }
        Command::InsertMany(id, first, last) => {
            let table = TableId::new(id)?;
            for key in first..last {
                db.insert(table, key, format!("v{key}").as_bytes())?;
            }
            println!("inserted {first}..{last}");
        }
        Command::Find(id, key) => match db.find(TableId::new(id)?, key)? {
            Some(value) => println!("{key}: {value}"),
            None => println!("{key} not found"),
        },
        Command::Update(id, key, value) => {
            db.update(TableId::new(id)?, key, value.as_bytes())?;
            println!("updated {key}");
        }
        Command::Delete(id, key) => {
            db.delete(TableId::new(id)?, key)?;
            println!("deleted {key}");
        }
        Command::Range(id, start, end) => {
            let records = db.find_range(TableId::new(id)?, start, end)?;
            for (key, value) in &records {
                println!("{key}: {value}");
            }
            println!("{} records", records.len());
        }
        Command::Join(left, right, path) => {
            let rows = db.join_tables(TableId::new(left)?, TableId::new(right)?, &path)?;
            println!("{rows} rows written to {path}");
        }
        Command::Leaves(id) => print!("{}", db.print_leaves(TableId::new(id)?)?),
        Command::Tree(id) => print!("{}", db.print_tree(TableId::new(id)?)?),
        Command::Page(id, page) => {
            println!("{}", db.describe_page(TableId::new(id)?, PageNum(page))?);
        }
        Command::Verify(id) => println!("ok: {}", db.verify(TableId::new(id)?)?),
        Command::Buffer => print!("{}", db.describe_buffer()),
        Command::Stats => println!("{}", db.stats()),
        Command::Shutdown | Command::Quit => return Ok(false),
    }
    Ok(true)
}

fn main() {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log));
    fmt().with_env_filter(filter).with_target(true).init();

    let config = Config::builder()
        .pool_size(args.frames)
        .eviction_policy(args.policy.into())
        .verify_checksums(!args.no_checksums)
        .build();

    let mut db = match Database::init(config) {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    println!("{HELP}");
    let stdin = io::stdin();
    let mut shutdown = false;
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Failed to read input: {}", e);
                break;
            }
        };

        match parse(&line) {
            Ok(None) => {}
            Ok(Some(command)) => {
                shutdown = command == Command::Shutdown;
                match execute(&mut db, command) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => println!("error: {e}"),
                }
            }
            Err(msg) => println!("{msg}"),
        }
        let _ = io::stdout().flush();
    }

    if shutdown {
        if let Err(e) = db.shutdown() {
            tracing::error!("Shutdown failed: {}", e);
            std::process::exit(1);
        }
        println!("all tables flushed");
    }
}
