use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lmi_checkout::model::{BuyerRef, Money, PaymentMethod, ShippingAddress, StoreRef, VariantRecord, VariantRef};
use lmi_checkout::orders::RandomOrderNumbers;
use lmi_checkout::payment::SimulatedGateway;
use lmi_checkout::store::memory::{MemoryCartSessions, MemoryInventory, MemoryOrderStore, RecordingNotificationSink};
use lmi_checkout::{CheckoutConfig, CheckoutRequest, CheckoutService, Collaborators, DeliveryCalculator};
use std::sync::Arc;
use tokio::runtime::Runtime;

// Large enough that no benchmark run drains it.
const BENCH_STOCK: u32 = u32::MAX / 2;

fn bench_service(lines: usize) -> (CheckoutService, Vec<VariantRef>) {
  let variants: Vec<VariantRecord> = (0..lines)
    .map(|i| VariantRecord {
      variant_ref: VariantRef::new(format!("variant-{}", i)),
      store_ref: StoreRef::new(format!("store-{}", i % 3)),
      product_name: format!("Product {}", i),
      price: Money::new(100 + i as i64 * 25),
      stock: BENCH_STOCK,
    })
    .collect();
  let refs = variants.iter().map(|v| v.variant_ref.clone()).collect();

  let service = CheckoutService::new(
    Collaborators {
      inventory: Arc::new(MemoryInventory::with_variants(variants)),
      orders: Arc::new(MemoryOrderStore::new()),
      carts: Arc::new(MemoryCartSessions::new()),
      notifications: Arc::new(RecordingNotificationSink::new()),
      gateway: Arc::new(SimulatedGateway::new()),
      order_numbers: Arc::new(RandomOrderNumbers),
    },
    CheckoutConfig::default(),
  );
  (service, refs)
}

fn address() -> ShippingAddress {
  ShippingAddress {
    recipient_name: "Bench Buyer".to_string(),
    phone: "841234567".to_string(),
    street: "Rua da Bench, 1".to_string(),
    city: "Maputo".to_string(),
    ..ShippingAddress::default()
  }
}

fn bench_cash_on_delivery_checkout(c: &mut Criterion) {
  let mut group = c.benchmark_group("CheckoutCashOnDelivery");
  let rt = Runtime::new().unwrap();

  for lines in [1usize, 5, 20].iter() {
    let (service, refs) = bench_service(*lines);
    let mut round: u64 = 0;
    group.throughput(Throughput::Elements(*lines as u64));
    group.bench_with_input(BenchmarkId::from_parameter(lines), lines, |b, _| {
      b.to_async(&rt).iter(|| {
        round += 1;
        // Fresh buyer per iteration keeps the dedupe guard out of the picture.
        let buyer = BuyerRef::new(format!("bench-buyer-{}", round));
        let service = service.clone();
        let refs = refs.clone();
        async move {
          for variant in &refs {
            service.cart().add_line(&buyer, variant, 1).await.unwrap();
          }
          let receipt = service
            .checkout(CheckoutRequest {
              buyer: Some(buyer),
              shipping_address: address(),
              payment_method: PaymentMethod::CashOnDelivery,
              payment_contact: None,
              idempotency_key: None,
            })
            .await
            .unwrap();
          criterion::black_box(receipt.order.total);
        }
      });
    });
  }
  group.finish();
}

fn bench_delivery_quote(c: &mut Criterion) {
  let calculator = DeliveryCalculator::new();
  let mut group = c.benchmark_group("DeliveryQuote");
  for city in ["Maputo", "  lichinga ", "Somewhere Else"].iter() {
    group.bench_with_input(BenchmarkId::from_parameter(city.trim()), city, |b, city| {
      b.iter(|| criterion::black_box(calculator.quote(city)))
    });
  }
  group.finish();
}

criterion_group!(benches, bench_cash_on_delivery_checkout, bench_delivery_quote);
criterion_main!(benches);
