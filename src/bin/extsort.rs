use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use bytes::{Buf, BufMut, BytesMut};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use extsort_collect::{
    ConfigurationBuilder, DecodeError, ExternalSort, Serializer, ensure_remaining,
};

/// Demo record: a positive id and a key made of decimal digits.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Data {
    id: u32,
    key: String,
}

struct DataSerializer;

impl Serializer<Data> for DataSerializer {
    fn write(&self, record: &Data, buf: &mut BytesMut) {
        buf.put_u32(record.id);
        buf.put_u32(record.key.len() as u32);
        buf.put_slice(record.key.as_bytes());
    }

    fn read(&self, buf: &mut &[u8]) -> Result<Data, DecodeError> {
        let id = buf.try_get_u32()?;
        if id == 0 {
            return Err(DecodeError::new(format!("invalid id {}", id)));
        }
        let len = buf.try_get_u32()? as usize;
        if len == 0 {
            return Err(DecodeError::new("empty key"));
        }
        let bytes: &[u8] = *buf;
        ensure_remaining(bytes, len)?;
        let (key, rest) = bytes.split_at(len);
        if let Some(c) = key.iter().find(|c| !c.is_ascii_digit()) {
            return Err(DecodeError::new(format!("not a digit: {:#04x}", c)));
        }
        let key = String::from_utf8_lossy(key).into_owned();
        *buf = rest;
        Ok(Data { id, key })
    }
}

#[derive(Parser)]
#[command(name = "extsort")]
#[command(about = "Sort files of fixed-format records that do not fit in memory")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a file of random demo records
    Generate {
        #[arg(short, long)]
        output: PathBuf,

        #[arg(short = 'n', long, default_value_t = 1_000_000)]
        count: u64,

        #[arg(long, default_value_t = 123_456_789)]
        seed: u64,
    },

    /// Sort a file of demo records by id
    Sort {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, default_value_t = 100_000)]
        max_items: usize,

        #[arg(long, default_value_t = 1024)]
        max_record_size: usize,

        #[arg(long, default_value_t = 1024 * 4096)]
        write_buffer_size: usize,

        #[arg(long, help = "Compact when more chunks than this are spilled")]
        max_chunks: Option<usize>,

        #[arg(long, help = "Sort full buffers with rayon")]
        parallel: bool,

        #[arg(long, help = "Directory for the spill file")]
        temp_dir: Option<PathBuf>,

        #[arg(long, help = "Check the output order while writing")]
        verify: bool,
    },
}

fn generate(output: PathBuf, count: u64, seed: u64) -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut file = File::create(&output)?;
    let mut buf = BytesMut::with_capacity(4096 * 64);

    for _ in 0..count {
        let id = rng.random_range(1..=100_000u32);
        let key = (id * 17).to_string().repeat(10);
        DataSerializer.write(&Data { id, key }, &mut buf);
        if buf.len() >= 4096 * 63 {
            file.write_all(&buf)?;
            buf.clear();
        }
    }
    file.write_all(&buf)?;

    info!("Wrote {} records to {}", count, output.display());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn sort(
    input: PathBuf,
    output: PathBuf,
    max_items: usize,
    max_record_size: usize,
    write_buffer_size: usize,
    max_chunks: Option<usize>,
    parallel: bool,
    temp_dir: Option<PathBuf>,
    verify: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut builder = ConfigurationBuilder::new(DataSerializer, |a: &Data, b: &Data| {
        a.id.cmp(&b.id)
    })
    .internal_sort_max_items(max_items)
    .max_record_size(max_record_size)
    .write_buffer_size(write_buffer_size)
    .parallel_sort(parallel);
    if let Some(max_chunks) = max_chunks {
        builder = builder.max_number_of_chunks(max_chunks);
    }
    if let Some(temp_dir) = temp_dir {
        builder = builder.temp_dir(temp_dir);
    }
    let sorter = ExternalSort::new(builder.build()?);

    let start = Instant::now();
    let sorted = sorter.sort_file(&input)?;
    let total = sorted.len_hint();
    info!(
        "Sorted {} records from {} in {:.3}s",
        total,
        input.display(),
        start.elapsed().as_secs_f64()
    );

    let mut file = File::create(&output)?;
    let mut buf = BytesMut::with_capacity(write_buffer_size);
    let mut previous: Option<Data> = None;
    for record in sorted {
        let record = record?;
        if verify {
            if let Some(prev) = &previous {
                if prev.id > record.id {
                    return Err(format!("output not sorted: {} after {}", record.id, prev.id).into());
                }
            }
        }
        DataSerializer.write(&record, &mut buf);
        if write_buffer_size.saturating_sub(buf.len()) < max_record_size {
            file.write_all(&buf)?;
            buf.clear();
        }
        previous = Some(record);
    }
    file.write_all(&buf)?;

    info!(
        "Wrote {} in {:.3}s total",
        output.display(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    match Args::parse().command {
        Command::Generate {
            output,
            count,
            seed,
        } => generate(output, count, seed),
        Command::Sort {
            input,
            output,
            max_items,
            max_record_size,
            write_buffer_size,
            max_chunks,
            parallel,
            temp_dir,
            verify,
        } => sort(
            input,
            output,
            max_items,
            max_record_size,
            write_buffer_size,
            max_chunks,
            parallel,
            temp_dir,
            verify,
        ),
    }
}
