use rawstream::exif::TagType;
use rawstream::{AnyDatastream, Datastream, ExifParser};
use std::error::Error;
use std::time::Instant;

const PREVIEW_VALUES: usize = 8;

fn main() -> Result<(), Box<dyn Error>> {
    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: rawstream <path>");
        std::process::exit(2);
    };

    println!("Opening `{path}`");
    let mut stream = AnyDatastream::open(&path)?;
    println!("{} datastream, {} bytes", stream.kind(), stream.size());

    let t0 = Instant::now();
    let n = ExifParser::new().parse(&mut stream, |entry, stream| {
        let value = match entry.datatype {
            TagType::Ascii => match entry.read_string(stream) {
                Ok(s) => format!("{s:?}"),
                Err(e) => format!("<{e}>"),
            },
            TagType::Undefined | TagType::Unknown => format!("{} bytes", entry.count),
            _ => match entry.read_values::<f64, _>(stream) {
                Err(e) => format!("<{e}>"),
                Ok(values) => {
                    let shown: Vec<_> = values.iter().take(PREVIEW_VALUES).collect();
                    if values.len() > PREVIEW_VALUES {
                        format!("{shown:?}...")
                    } else {
                        format!("{shown:?}")
                    }
                }
            },
        };
        println!("{entry}: {value}");
        Ok(())
    })?;
    println!("Visited {n} entries in {}us", t0.elapsed().as_micros());
    Ok(())
}
