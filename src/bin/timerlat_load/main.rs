use std::path::PathBuf;

use timerlat_load::prelude::*;

/// User-space timerlat workload
///
/// Dispatch `rtla timerlat -U` in a terminal first, then run this pinned to a
/// CPU in another one, e.g. `timerlat_load 1 -p 95`. Every timerlat activation
/// is followed by a block read from the data source, so rtla reports the
/// response time of that load as the return-from-user latency.
#[derive(clap::Parser, Debug)]
#[command(about, long_about, verbatim_doc_comment)]
pub struct MyArgs {
    /// CPU to run the timerlat thread on
    #[arg(value_name = "CPU", allow_negative_numbers = true)]
    pub cpu: i64,

    /// SCHED_FIFO priority
    #[arg(short = 'p', long = "prio", value_name = "i64", allow_negative_numbers = true)]
    pub prio: Option<i64>,

    /// data read on every activation
    #[arg(short = 's', long = "size", value_name = "MiB", default_value = "20",
        value_parser = clap::value_parser!(u32).range(1..))]
    pub size_mb: u32,

    /// max running time
    #[arg(short = 't', long = "max-time", value_name = "sec: u64")]
    pub max_time: Option<u64>,

    /// tracefs mount point
    #[arg(long = "tracing-dir", value_name = "path", default_value = DEFAULT_TRACING_DIR)]
    pub tracing_dir: PathBuf,

    /// file the load is read from
    #[arg(long = "data-source", value_name = "path", default_value = DEFAULT_DATA_SOURCE)]
    pub data_source: PathBuf,
}

impl TryFrom<MyArgs> for LoadConfig {
    type Error = LoadError;

    fn try_from(args: MyArgs) -> Result<Self, Self::Error> {
        Ok(LoadConfig {
            cpu: cpu_index(args.cpu)?,
            priority: args.prio,
            load_size: args.size_mb as usize * 1024 * 1024,
            tracing_dir: args.tracing_dir,
            data_source: args.data_source,
            max_time: args.max_time,
        })
    }
}

fn run(args: MyArgs) -> Result<LoadSummary, LoadError> {
    let config = LoadConfig::try_from(args)?;
    configure_context(&config)?;

    let LoadResources { mut timerlat, mut data } = acquire(&config)?;

    let exit = create_ctrlc_handler()?;
    let deadline = max_time_channel(config.max_time);

    log::info!("Running on CPU {}, reading {} bytes per activation", config.cpu, config.load_size);

    let summary = run_load_loop(&mut timerlat, &mut data, config.load_size, &exit, &deadline)?;

    println!("Leaving");
    Ok(summary)
}

fn main() {
    let args = <MyArgs as clap::Parser>::parse();
    init_logging();

    match run(args) {
        Ok(summary) => log::info!("{summary}"),
        Err(err) => {
            println!("{err}");
            if let Some(source) = std::error::Error::source(&err) {
                log::debug!("{source}");
            }
            std::process::exit(1);
        },
    };
}
