// Compiles storage.proto for the InvoiceStorage, OutboxStorage and
// Validation services. Both server and client code are generated: the
// storage service implements the servers, every other service links the
// clients.
fn main() {
    println!("cargo:rerun-if-changed=../../proto/storage.proto");

    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path().unwrap());
    }

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["../../proto/storage.proto"], &["../../proto"])
        .expect("Failed to compile storage.proto");
}
