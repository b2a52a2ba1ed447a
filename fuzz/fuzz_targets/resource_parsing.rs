#![no_main]

use libfuzzer_sys::fuzz_target;
use shtx::{ids::ResourceId, resources::GraphicsResource};

const NAMES: [&str; 4] = ["FUZZ_DNX", "FUZZ_BNL", "FUZZ_PAN_BNA", "FUZZ_CAN_BNA"];

fuzz_target!(|data: &[u8]| {
    let Some((&selector, payload)) = data.split_first() else {
        return;
    };
    let name = NAMES[usize::from(selector) % NAMES.len()];
    let id = ResourceId::new(u16::from(selector) << 4, name);
    let Ok(resource) = GraphicsResource::parse(id.clone(), payload) else {
        return;
    };
    // Palette entries lose bit 15, so compare the re-parsed form.
    let bytes = resource.to_bytes();
    assert_eq!(bytes.len(), payload.len());
    let reparsed = GraphicsResource::parse(id, &bytes).unwrap();
    assert_eq!(reparsed, resource);
    let _ = resource.to_image(Some(0));
});
