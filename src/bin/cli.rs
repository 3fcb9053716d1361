use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use log::info;

use dvb_si::constants::{PID_CAT, PID_NIT, PID_PAT, PID_SDT, PID_TDT};
use dvb_si::psi::{CatTable, NitTable, PatTable, SdtTable, Table, TimeTable};
use dvb_si::report::Reporter;
use dvb_si::{ScanOptions, EitScanner, SiCache, TransportPacket, parse_packets, table_from_packets};

#[derive(Parser)]
#[clap(name = "dvb-si", about = "Decode DVB SI tables from an MPEG-TS capture")]
struct Opt {
    /// Capture file (concatenated 188-byte packets)
    file: PathBuf,

    /// Indent the JSON output
    #[clap(long, default_value_t = false)]
    pretty: bool,

    /// More log output (-v info, -vv debug)
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Packet counts per PID
    Packets {
        #[clap(long)]
        pid: Option<u16>,
    },
    Pat,
    Cat,
    Nit,
    Sdt,
    /// TDT or TOT
    Tdt,
    /// Every PMT announced by the PAT
    Pmt,
    /// SDT services joined with PAT/PMT
    Services,
    /// Current and scheduled events
    Eit {
        /// Report the first present/following event even when not on air
        #[clap(long, default_value_t = false)]
        outdated: bool,
    },
    /// First PCR of the capture
    Pcr {
        #[clap(long)]
        pid: Option<u16>,
    },
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::parse();

    let level = match opt.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let data = std::fs::read(&opt.file).with_context(|| format!("reading {}", opt.file.display()))?;
    let packets = parse_packets(&data, None);
    info!("{}: {} packets", opt.file.display(), packets.len());

    let out = match opt.command {
        Command::Packets { pid } => Reporter::to_json(&Reporter::packet_summary(&packets, pid), opt.pretty),
        Command::Pat => table_json::<PatTable>(&packets, PID_PAT, opt.pretty)?,
        Command::Cat => table_json::<CatTable>(&packets, PID_CAT, opt.pretty)?,
        Command::Nit => table_json::<NitTable>(&packets, PID_NIT, opt.pretty)?,
        Command::Sdt => table_json::<SdtTable>(&packets, PID_SDT, opt.pretty)?,
        Command::Tdt => table_json::<TimeTable>(&packets, PID_TDT, opt.pretty)?,
        Command::Pmt => {
            let cache = SiCache::from_packets(&packets);
            if cache.pat.is_none() {
                bail!("no PAT in {}", opt.file.display());
            }
            Reporter::to_json(&cache.pmts, opt.pretty)
        }
        Command::Services => Reporter::services_json(&SiCache::from_packets(&packets), opt.pretty),
        Command::Eit { outdated } => {
            let res = EitScanner::new(ScanOptions { include_outdated: outdated, now: None }).scan(&packets);
            if !res.ok() {
                log::warn!("EIT scan finished with status {:?}", res.status);
            }
            Reporter::to_json(&res, opt.pretty)
        }
        Command::Pcr { pid } => match Reporter::first_pcr(&packets, pid) {
            Some(pcr) => Reporter::to_json(&pcr, opt.pretty),
            None => bail!("no PCR found"),
        },
    };

    println!("{out}");
    Ok(())
}

fn table_json<T: Table + serde::Serialize>(
    packets: &[TransportPacket],
    pid: u16,
    pretty: bool,
) -> anyhow::Result<String> {
    let table: T = table_from_packets(packets, pid).with_context(|| format!("no table on pid {pid:#06x}"))?;
    Ok(Reporter::to_json(&table, pretty))
}
