//! Emits a small object file to `demo.obj`: a code section with one exported function, a GOT
//! region, and a direct-call relocation. Run with `RUST_LOG=debug` to see the phase spans.

use indexmap::IndexMap;
use libcoffer::Architecture;
use libcoffer::Container;
use libcoffer::ContainerRef;
use libcoffer::InputImage;
use libcoffer::ObjectWriter;
use libcoffer::Relocation;
use libcoffer::RelocationKind;
use libcoffer::SymbolBinding;
use libcoffer::SymbolDecl;
use libcoffer::SymbolId;
use libcoffer::SymbolKind;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() -> libcoffer::error::Result {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let code = [0x90u8; 128];
    let got = [0u8; 16];

    let mut relocations = IndexMap::new();
    relocations.insert(
        SymbolId(0),
        vec![Relocation {
            kind: RelocationKind::DirectCall,
            container: ContainerRef::Code,
            offset: 32,
            size: 5,
        }],
    );

    let image = InputImage {
        arch: Architecture::X86_64,
        code: Container {
            name: ".text",
            bytes: &code,
            alignment: 16,
            has_relocations: true,
        },
        read_only: Vec::new(),
        writable: vec![Container {
            name: ".got",
            bytes: &got,
            alignment: 8,
            has_relocations: false,
        }],
        symbols: vec![SymbolDecl {
            name: "demo_entry",
            kind: SymbolKind::Function,
            binding: SymbolBinding::External,
            container: ContainerRef::Code,
            offset: 0,
        }],
        relocations,
        unique_relocations: IndexMap::new(),
    };

    ObjectWriter::new(&image).emit_to_file("demo.obj".as_ref())?;
    println!("wrote demo.obj");
    Ok(())
}
