use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

use snes_core::{Config, Snes, SCREEN_HEIGHT, SCREEN_WIDTH};

struct Options {
    rom: String,
    frames: u64,
    screenshot: Option<PathBuf>,
    save_state: Option<PathBuf>,
    load_state: Option<PathBuf>,
    buttons: u16,
}

fn usage(program: &str) {
    eprintln!(
        "Usage: {} [--frames N] [--screenshot out.ppm] [--save-state F] [--load-state F] [--buttons HEX] <rom>",
        program
    );
    eprintln!("Supported formats: .sfc, .smc");
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut options = Options {
        rom: String::new(),
        frames: 60,
        screenshot: None,
        save_state: None,
        load_state: None,
        buttons: 0,
    };
    let mut rom = None;
    let mut i = 1;
    while i < args.len() {
        let value = |i: usize| {
            args.get(i + 1)
                .cloned()
                .ok_or_else(|| format!("{} requires a value", args[i]))
        };
        match args[i].as_str() {
            "--frames" => {
                options.frames = value(i)?
                    .parse()
                    .map_err(|e| format!("--frames: {}", e))?;
                i += 2;
            }
            "--screenshot" => {
                options.screenshot = Some(PathBuf::from(value(i)?));
                i += 2;
            }
            "--save-state" => {
                options.save_state = Some(PathBuf::from(value(i)?));
                i += 2;
            }
            "--load-state" => {
                options.load_state = Some(PathBuf::from(value(i)?));
                i += 2;
            }
            "--buttons" => {
                let v = value(i)?;
                options.buttons = u16::from_str_radix(v.trim_start_matches("0x"), 16)
                    .map_err(|e| format!("--buttons: {}", e))?;
                i += 2;
            }
            s if s.starts_with('-') => return Err(format!("Unknown option: {}", s)),
            s => {
                rom = Some(s.to_string());
                i += 1;
            }
        }
    }
    options.rom = rom.ok_or("ROM argument missing")?;
    Ok(options)
}

/// Direct path, then `roms/<arg>`, each with `.sfc`/`.smc` tried when the
/// argument has no extension.
fn resolve_rom_path(arg: &str) -> Result<PathBuf, String> {
    fn with_ext(base: &Path) -> Option<PathBuf> {
        if base.exists() {
            return Some(base.to_path_buf());
        }
        if base.extension().is_some() {
            return None;
        }
        ["sfc", "smc"]
            .iter()
            .map(|ext| base.with_extension(ext))
            .find(|p| p.exists())
    }

    with_ext(Path::new(arg))
        .or_else(|| with_ext(&Path::new("roms").join(arg)))
        .ok_or_else(|| {
            format!(
                "ROM '{}' not found. Place *.sfc or *.smc files under ./roms or provide a valid path.",
                arg
            )
        })
}

/// FNV-1a over the bytes of a slice of words.
fn digest<T: Copy + Into<u64>>(words: &[T], bytes_per_word: usize) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for &w in words {
        let w: u64 = w.into();
        for i in 0..bytes_per_word {
            hash ^= (w >> (i * 8)) & 0xFF;
            hash = hash.wrapping_mul(0x0000_0100_0000_01B3);
        }
    }
    hash
}

fn write_ppm(path: &Path, pixels: &[u32]) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write!(out, "P6\n{} {}\n255\n", SCREEN_WIDTH, SCREEN_HEIGHT)?;
    for &p in pixels {
        out.write_all(&[(p >> 16) as u8, (p >> 8) as u8, p as u8])?;
    }
    out.flush()
}

fn run(options: Options) -> Result<(), String> {
    let rom_path = resolve_rom_path(&options.rom)?;
    let rom = std::fs::read(&rom_path).map_err(|e| format!("Failed to read ROM: {}", e))?;
    let mut snes = Snes::with_config(rom, Config::from_env())
        .map_err(|e| format!("Failed to load ROM: {}", e))?;

    let header = snes.cartridge().header();
    println!(
        "{}: {:?}, {} KiB ROM, {} KiB SRAM, {:?}",
        header.title,
        header.mapper_type,
        snes.cartridge().rom().len() / 1024,
        header.ram_size / 1024,
        snes.region()
    );

    if let Some(path) = &options.load_state {
        snes.load_state(path)
            .map_err(|e| format!("Failed to load state: {}", e))?;
        println!("Loaded state from {}", path.display());
    }

    // 534 NTSC / 641 PAL pairs per frame on average; leave headroom.
    let mut audio = vec![0i16; 2 * 1024];
    let mut audio_hash_input: Vec<u16> = Vec::new();
    for _ in 0..options.frames {
        snes.set_input(0, options.buttons);
        snes.run_frame();
        let pairs = snes.audio_samples(&mut audio);
        audio_hash_input.extend(audio[..pairs * 2].iter().map(|&s| s as u16));
    }

    println!("frames: {}", snes.frames());
    println!("cycles: {}", snes.cycles());
    println!("frame digest: {:016x}", digest(snes.frame_buffer(), 4));
    println!(
        "audio digest: {:016x} ({} samples)",
        digest(&audio_hash_input, 2),
        audio_hash_input.len() / 2
    );

    if let Some(path) = &options.screenshot {
        write_ppm(path, snes.frame_buffer())
            .map_err(|e| format!("Failed to write screenshot: {}", e))?;
        println!("Wrote {}", path.display());
    }
    if let Some(path) = &options.save_state {
        snes.save_state(path)
            .map_err(|e| format!("Failed to save state: {}", e))?;
        println!("Saved state to {}", path.display());
    }
    Ok(())
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("headless");
    if args.len() < 2 || args.iter().any(|a| a == "--help" || a == "-h") {
        usage(program);
        return;
    }

    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(msg) => {
            eprintln!("{}", msg);
            usage(program);
            process::exit(2);
        }
    };
    if let Err(msg) = run(options) {
        eprintln!("{}", msg);
        process::exit(1);
    }
}
