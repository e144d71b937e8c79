use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use sss_core::builder::{
    Button, Dropdown, GroupHeader, Keybind, PageBuilder, PlainText, Slider, TextArea, TwoButtons,
};
use sss_core::protocol::{encode_payload, DropdownPayload, SliderPayload};
use sss_core::{ElementKind, MemoryTransport, PageStore, PageTemplate, Synchronizer};
use uuid::Uuid;

fn template() -> PageTemplate {
    let mut builder = PageBuilder::new().add_group_header(GroupHeader::new("Settings"));
    for i in 0..8 {
        builder = builder
            .add_button(Button::new(format!("Button {i}"), "Click").on_interact(|_| {}))
            .add_dropdown(Dropdown::new(format!("Mode {i}"), ["A", "B", "C"]).on_changed(|_, _| {}))
            .add_keybind(Keybind::new(format!("Key {i}")))
            .add_plain_text(PlainText::new(format!("Name {i}")))
            .add_slider(Slider::new(format!("Volume {i}"), 0.0, 100.0).on_changed(|_, _| {}))
            .add_text_area(TextArea::new(format!("Text {i}")))
            .add_two_buttons(TwoButtons::new(format!("Side {i}"), "A", "B"));
    }
    builder.build().unwrap()
}

fn bench_get_existing(c: &mut Criterion) {
    let store = PageStore::new(template());
    let client = Uuid::new_v4();
    store.get(client);

    c.bench_function("store_get_existing", |b| {
        b.iter(|| black_box(store.get(black_box(client))));
    });
}

fn bench_get_new_client(c: &mut Criterion) {
    let store = PageStore::new(template());

    c.bench_function("store_get_new_57_elements", |b| {
        b.iter(|| {
            let client = Uuid::new_v4();
            black_box(store.get(client));
            store.remove(client);
        });
    });
}

fn bench_serialize_page(c: &mut Criterion) {
    let page = template().instantiate(Uuid::new_v4());

    c.bench_function("serialize_page_57_elements", |b| {
        b.iter(|| black_box(Synchronizer::serialize(black_box(&page)).unwrap()));
    });
}

fn bench_route_slider(c: &mut Criterion) {
    let store = PageStore::new(template());
    let client = Uuid::new_v4();
    let payloads: Vec<Vec<u8>> = (0..2)
        .map(|v| encode_payload(&SliderPayload { value: v as f32, dragging: false }).unwrap())
        .collect();
    let mut flip = 0;

    c.bench_function("route_slider_change", |b| {
        b.iter(|| {
            flip ^= 1;
            black_box(store.route_input(client, 6, ElementKind::Slider, &payloads[flip]).unwrap());
        });
    });
}

fn bench_route_dropdown_unchanged(c: &mut Criterion) {
    let store = PageStore::new(template());
    let client = Uuid::new_v4();
    let payload = encode_payload(&DropdownPayload { index: 1 }).unwrap();
    store.route_input(client, 3, ElementKind::Dropdown, &payload).unwrap();

    c.bench_function("route_dropdown_unchanged", |b| {
        b.iter(|| {
            black_box(store.route_input(client, 3, ElementKind::Dropdown, &payload).unwrap());
        });
    });
}

fn bench_send_all_100_clients(c: &mut Criterion) {
    let store = PageStore::new(template());
    let transport = Arc::new(MemoryTransport::new());
    let _sub = store.start(transport.clone());
    for _ in 0..100 {
        store.get(Uuid::new_v4());
    }

    c.bench_function("send_all_100_clients", |b| {
        b.iter(|| {
            black_box(store.send_all());
            transport.take();
        });
    });
}

criterion_group!(
    benches,
    bench_get_existing,
    bench_get_new_client,
    bench_serialize_page,
    bench_route_slider,
    bench_route_dropdown_unchanged,
    bench_send_all_100_clients,
);
criterion_main!(benches);
