fn main() {
    if let Err(err) = ragdesk_lib::run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
