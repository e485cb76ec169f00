use demitasse::Vm;
use simplelog::*;
use std::fs::File;

use log::LevelFilter;
use std::env;
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();
    let _ = WriteLogger::init(
        LevelFilter::Info,
        ConfigBuilder::new()
            .set_time_level(LevelFilter::Off)
            .set_thread_level(LevelFilter::Off)
            .set_target_level(LevelFilter::Off)
            .build(),
        File::create("demitasse.log").unwrap(),
    );

    if args.len() < 2 {
        eprintln!("usage: demitasse <class files and class directories>");
        process::exit(2);
    }

    let mut vm = Vm::new();
    for arg in &args[1..] {
        if Path::new(arg).is_dir() {
            vm.add_directory(arg);
        } else if let Err(err) = vm.load_class(arg) {
            eprintln!("{}: {}", arg, err);
            process::exit(1);
        }
    }

    if let Err(err) = vm.run() {
        eprintln!("{}", err);
        process::exit(1);
    }
}
