use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use orderflow::{
  Actor, ContextData, CustomerDetails, MemoryStore, MockGateway, NewOrder, OrderError, OrderLine, OrderService,
  PaymentStatus, Pipeline, ServiceConfig, ShippingAddress, StepControl,
};
use std::sync::Arc;
use tokio::runtime::Runtime;
use uuid::Uuid;

const SERVER_KEY: &str = "bench-server-key";

fn shipping() -> ShippingAddress {
  ShippingAddress {
    full_name: "Bench Buyer".to_string(),
    phone: "0800".to_string(),
    address: "Jl. Benchmark 1".to_string(),
    city: "Jakarta".to_string(),
    postal_code: "10110".to_string(),
  }
}

fn service(store: Arc<MemoryStore>) -> (OrderService, Arc<MockGateway>) {
  let gateway = Arc::new(MockGateway::new(SERVER_KEY));
  (
    OrderService::with_store(store, gateway.clone(), ServiceConfig::default()),
    gateway,
  )
}

// --- Benchmark Functions ---

fn bench_create_order(c: &mut Criterion) {
  let mut group = c.benchmark_group("CreateOrder");
  let rt = Runtime::new().unwrap();

  for num_lines in [1usize, 5, 10].iter() {
    let store = Arc::new(MemoryStore::new());
    let product_ids: Vec<Uuid> = (0..*num_lines)
      .map(|i| store.add_product(&format!("SKU-{}", i), "Bench item", 1_000, i64::MAX / 2).id)
      .collect();
    let (service, _gateway) = service(store);
    let service = Arc::new(service);
    let actor = Actor::customer(Uuid::new_v4());

    group.throughput(Throughput::Elements(*num_lines as u64));
    group.bench_with_input(BenchmarkId::from_parameter(num_lines), num_lines, |b, _| {
      b.to_async(&rt).iter_batched(
        || NewOrder {
          items: product_ids
            .iter()
            .map(|id| OrderLine {
              product_id: *id,
              quantity: 1,
            })
            .collect(),
          shipping: shipping(),
          notes: None,
        },
        |request| {
          let service = service.clone();
          async move { service.create_order(&actor, request).await.unwrap() }
        },
        criterion::BatchSize::SmallInput,
      );
    });
  }
  group.finish();
}

fn bench_notifications(c: &mut Criterion) {
  let mut group = c.benchmark_group("HandleNotification");
  let rt = Runtime::new().unwrap();

  let store = Arc::new(MemoryStore::new());
  let product = store.add_product("SKU-N", "Bench item", 25_000, 1_000_000);
  let (service, gateway) = service(store);
  let actor = Actor::customer(Uuid::new_v4());

  let (order, reference) = rt.block_on(async {
    let order = service
      .create_order(
        &actor,
        NewOrder {
          items: vec![OrderLine {
            product_id: product.id,
            quantity: 2,
          }],
          shipping: shipping(),
          notes: None,
        },
      )
      .await
      .unwrap();
    let session = service
      .create_payment_session(&actor, order.id(), CustomerDetails::default())
      .await
      .unwrap();
    (order, session.reference)
  });

  let settled = gateway.notification(&reference, "settlement", order.total());
  rt.block_on(service.handle_notification(&settled)).unwrap();

  group.throughput(Throughput::Elements(1));
  group.bench_function("duplicate_redelivery", |b| {
    b.to_async(&rt).iter(|| async { service.handle_notification(&settled).await.unwrap() });
  });

  let forged = MockGateway::new("wrong-key").notification(&reference, "settlement", order.total());
  group.bench_function("forged_rejection", |b| {
    b.to_async(&rt).iter(|| async { service.handle_notification(&forged).await.unwrap_err() });
  });
  group.finish();
}

fn bench_saga_pipeline(c: &mut Criterion) {
  let mut group = c.benchmark_group("SagaPipeline");
  let rt = Runtime::new().unwrap();

  for num_steps in [1usize, 5, 10].iter() {
    let names: Vec<&'static str> = (0..*num_steps)
      .map(|i| &*Box::leak(format!("step_{}", i).into_boxed_str()))
      .collect();
    let step_defs: Vec<(&str, bool)> = names.iter().map(|n| (*n, false)).collect();

    let mut pipeline = Pipeline::<u64, OrderError>::new("bench", &step_defs);
    for name in &names {
      pipeline
        .on_step(name, |ctx: ContextData<u64>| {
          *ctx.write() += 1;
          std::future::ready(Ok::<_, OrderError>(StepControl::Continue))
        })
        .compensate_step(name, |ctx: ContextData<u64>| {
          *ctx.write() -= 1;
          std::future::ready(())
        });
    }
    let pipeline = Arc::new(pipeline);

    group.throughput(Throughput::Elements(*num_steps as u64));
    group.bench_with_input(BenchmarkId::from_parameter(num_steps), num_steps, |b, _| {
      b.to_async(&rt).iter_batched(
        || ContextData::new(0u64),
        |ctx| {
          let pipeline = pipeline.clone();
          async move { pipeline.run(ctx).await.unwrap() }
        },
        criterion::BatchSize::SmallInput,
      );
    });
  }
  group.finish();
}

fn bench_status_merge(c: &mut Criterion) {
  let mut group = c.benchmark_group("PaymentStatusMerge");
  let all = [
    PaymentStatus::Pending,
    PaymentStatus::Capture,
    PaymentStatus::Settlement,
    PaymentStatus::Deny,
    PaymentStatus::Cancel,
    PaymentStatus::Expire,
    PaymentStatus::Failure,
  ];
  group.throughput(Throughput::Elements((all.len() * all.len()) as u64));
  group.bench_function("all_pairs", |b| {
    b.iter(|| {
      let mut accepted = 0usize;
      for from in all {
        for to in all {
          if from.merge(to, "bench").is_ok() {
            accepted += 1;
          }
        }
      }
      accepted
    });
  });
  group.finish();
}

criterion_group!(
  benches,
  bench_create_order,
  bench_notifications,
  bench_saga_pipeline,
  bench_status_merge
);
criterion_main!(benches);
