use which::which;

/// Rebuild the object whenever a different bpf-linker is installed.
fn main() {
    if let Ok(bpf_linker) = which("bpf-linker") {
        println!("cargo:rerun-if-changed={}", bpf_linker.display());
    }
}
