fn main() {
    if let Err(err) = niu_scooter_api::app::run() {
        eprintln!("application startup failed: {err}");
        std::process::exit(1);
    }
}
