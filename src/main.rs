fn main() {
    if let Err(err) = wgpu_scene::run() {
        eprintln!("Application error: {err}");
        std::process::exit(1);
    }
}
